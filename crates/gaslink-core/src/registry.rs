//! The network registry: exclusive owner of the node-to-network index and
//! the live network set.
//!
//! Topology callbacks are plain method calls delivered into this single
//! processing path -- there are no ambient subscriptions. Adds are queued
//! and classified in a batch (see [`FrameDriver`]); removals are processed
//! immediately so a balance pass never sees a stale node.
//!
//! [`FrameDriver`]: crate::scheduler::FrameDriver

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::event::LinkEvent;
use crate::fixed::Fixed64;
use crate::id::{NetworkId, NodeId};
use crate::network::{Integrity, OxygenNetwork};
use crate::node::{Role, classify};
use crate::port::{ConveyorOracle, EnabledStateStore, NodeIo};

/// Owns every live [`OxygenNetwork`] and the node-to-network index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRegistry {
    cfg: LinkConfig,
    /// Live networks, keyed by id. BTreeMap keeps balance and matching
    /// order deterministic (ids are allocated monotonically).
    networks: BTreeMap<NetworkId, OxygenNetwork>,
    /// Exactly one entry per tracked node. Membership-only nodes appear
    /// here without appearing in any role list.
    index: HashMap<NodeId, NetworkId>,
    /// Newly-seen nodes awaiting debounced classification.
    pending: Vec<NodeId>,
    next_network_id: u32,
}

impl NetworkRegistry {
    pub fn new(cfg: LinkConfig) -> Self {
        Self {
            cfg,
            networks: BTreeMap::new(),
            index: HashMap::new(),
            pending: Vec::new(),
            next_network_id: 0,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.cfg
    }

    pub fn network(&self, id: NetworkId) -> Option<&OxygenNetwork> {
        self.networks.get(&id)
    }

    pub fn networks(&self) -> impl Iterator<Item = &OxygenNetwork> {
        self.networks.values()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// The network a node currently belongs to, if tracked.
    pub fn network_of(&self, node: NodeId) -> Option<NetworkId> {
        self.index.get(&node).copied()
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    /// Every tracked node and its owning network. Iteration order is
    /// unspecified.
    pub fn tracked_nodes(&self) -> impl Iterator<Item = (NodeId, NetworkId)> + '_ {
        self.index.iter().map(|(node, id)| (*node, *id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn alloc_network_id(&mut self) -> NetworkId {
        let id = NetworkId(self.next_network_id);
        self.next_network_id += 1;
        id
    }

    // -----------------------------------------------------------------------
    // Add path
    // -----------------------------------------------------------------------

    /// Queue a newly-seen node for the next classification batch.
    pub fn queue_add(&mut self, node: NodeId) {
        if !self.pending.contains(&node) {
            self.pending.push(node);
        }
    }

    /// Drain the pending queue and classify every queued node, in queue
    /// order. Returns the structural events this produced.
    pub fn process_pending<H: ConveyorOracle + NodeIo>(&mut self, host: &H) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        let batch: Vec<NodeId> = std::mem::take(&mut self.pending);
        for node in batch {
            self.process_add(host, node, &mut events);
        }
        events
    }

    fn process_add<H: ConveyorOracle + NodeIo>(
        &mut self,
        host: &H,
        node: NodeId,
        events: &mut Vec<LinkEvent>,
    ) {
        if self.index.contains_key(&node) {
            return;
        }
        let role = host
            .kind(node)
            .and_then(|kind| classify(kind, &host.subtype(node)));

        // Which live networks can this node reach?
        let connected: Vec<NetworkId> = self
            .networks
            .values()
            .filter(|network| network.is_conveyor_connected(host, node))
            .map(|network| network.id())
            .collect();

        match connected.split_first() {
            None => {
                // Unreachable from every live network. Only classifiable
                // nodes warrant a network of their own.
                if role.is_none() {
                    return;
                }
                let id = self.alloc_network_id();
                let mut network = OxygenNetwork::new(id);
                network.try_add_node(host, node);
                self.networks.insert(id, network);
                self.index.insert(node, id);
                events.push(LinkEvent::NetworkCreated {
                    network: id,
                    reference: node,
                });
                self.push_attached(events, id, node, role);
            }
            Some((&target, rest)) => {
                self.index.insert(node, target);
                if role.is_some() {
                    if let Some(network) = self.networks.get_mut(&target) {
                        network.try_add_node(host, node);
                    }
                    self.push_attached(events, target, node, role);
                }
                // The node bridges several networks: fold the rest into the
                // first match. Must be transitively correct -- every index
                // entry that pointed at a source ends up at the target.
                for &source in rest {
                    self.merge_into(source, target, events);
                }
            }
        }
    }

    fn push_attached(
        &self,
        events: &mut Vec<LinkEvent>,
        network: NetworkId,
        node: NodeId,
        role: Option<Role>,
    ) {
        if let Some(role) = role {
            events.push(LinkEvent::NodeAttached {
                network,
                node,
                role,
            });
        }
    }

    fn merge_into(&mut self, source: NetworkId, target: NetworkId, events: &mut Vec<LinkEvent>) {
        let Some(mut drained) = self.networks.remove(&source) else {
            return;
        };
        let slots = drained.drain_slots();
        drained.invalidate();

        if let Some(network) = self.networks.get_mut(&target) {
            for slot in slots {
                network.insert_slot(slot);
            }
        }
        for owner in self.index.values_mut() {
            if *owner == source {
                *owner = target;
            }
        }
        events.push(LinkEvent::NetworksMerged { source, target });
    }

    // -----------------------------------------------------------------------
    // Remove path
    // -----------------------------------------------------------------------

    /// Remove a node immediately and repair the partition: retire the
    /// network if it emptied out, or split off the members the removal
    /// disconnected.
    pub fn remove_node<H: ConveyorOracle + NodeIo>(
        &mut self,
        host: &H,
        node: NodeId,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();

        // A node can disappear before its batch ever ran.
        self.pending.retain(|n| *n != node);

        let Some(net_id) = self.index.remove(&node) else {
            return events;
        };
        let Some(network) = self.networks.get_mut(&net_id) else {
            return events;
        };
        network.remove_node(node);

        match network.check_integrity(host) {
            Integrity::Empty => self.retire(net_id, &mut events),
            Integrity::Split { disconnected } => {
                self.split_off(net_id, disconnected, &mut events);
            }
            Integrity::Connected => {}
        }
        events
    }

    fn retire(&mut self, net_id: NetworkId, events: &mut Vec<LinkEvent>) {
        if let Some(mut network) = self.networks.remove(&net_id) {
            network.invalidate();
        }
        // Drop the last member's entry (and any membership-only stragglers)
        // so no index entry points at a dead network.
        self.index.retain(|_, owner| *owner != net_id);
        events.push(LinkEvent::NetworkRetired { network: net_id });
    }

    fn split_off(
        &mut self,
        source: NetworkId,
        disconnected: Vec<NodeId>,
        events: &mut Vec<LinkEvent>,
    ) {
        let created = self.alloc_network_id();
        let mut fresh = OxygenNetwork::new(created);

        if let Some(network) = self.networks.get_mut(&source) {
            for &node in &disconnected {
                if let Some(slot) = network.take_slot(node) {
                    fresh.insert_slot(slot);
                }
                self.index.insert(node, created);
            }
        }
        self.networks.insert(created, fresh);
        events.push(LinkEvent::NetworkSplit {
            source,
            created,
            moved: disconnected,
        });
    }

    // -----------------------------------------------------------------------
    // Tick path
    // -----------------------------------------------------------------------

    /// Run one balance pass over every live network, in id order.
    pub fn balance_all<W: NodeIo, S: EnabledStateStore>(
        &mut self,
        io: &mut W,
        store: &mut S,
        dt: Fixed64,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        for network in self.networks.values_mut() {
            events.extend(network.balance(io, store, &self.cfg, dt));
        }
        events
    }

    /// Route a host enabled-changed notification to the owning consumer.
    pub fn on_enabled_changed(&mut self, node: NodeId, now_enabled: bool) {
        if let Some(net_id) = self.index.get(&node) {
            if let Some(network) = self.networks.get_mut(net_id) {
                network.notify_enabled_changed(node, now_enabled);
            }
        }
    }

    /// Tear down everything: invalidate every network, drop all tracking.
    /// Used when the structure itself is removed from the world.
    pub fn invalidate_all(&mut self) {
        for network in self.networks.values_mut() {
            network.invalidate();
        }
        self.networks.clear();
        self.index.clear();
        self.pending.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestGrid, fixed, test_config, track_all};

    fn registry() -> NetworkRegistry {
        NetworkRegistry::new(test_config())
    }

    // -----------------------------------------------------------------------
    // Add / classify
    // -----------------------------------------------------------------------

    #[test]
    fn unconnectable_node_gets_its_own_network() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);

        let mut reg = registry();
        let events = track_all(&mut reg, &grid, &[gen]);

        assert_eq!(reg.network_count(), 1);
        assert!(reg.is_tracked(gen));
        assert!(matches!(events[0], LinkEvent::NetworkCreated { .. }));
    }

    #[test]
    fn connected_node_joins_the_existing_network() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let tank = grid.add_tank(100.0, 0.5);
        grid.link(gen, tank);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen]);
        track_all(&mut reg, &grid, &[tank]);

        assert_eq!(reg.network_count(), 1);
        assert_eq!(reg.network_of(tank), reg.network_of(gen));
    }

    #[test]
    fn unclassifiable_unconnected_node_is_not_tracked() {
        let mut grid = TestGrid::new();
        let junction = grid.add_plain();

        let mut reg = registry();
        let events = track_all(&mut reg, &mut grid, &[junction]);

        assert_eq!(reg.network_count(), 0);
        assert!(!reg.is_tracked(junction));
        assert!(events.is_empty());
    }

    #[test]
    fn unclassifiable_connected_node_is_tracked_for_membership_only() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let junction = grid.add_plain();
        grid.link(gen, junction);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen]);
        track_all(&mut reg, &grid, &[junction]);

        let net_id = reg.network_of(junction).unwrap();
        assert_eq!(Some(net_id), reg.network_of(gen));
        // In the index, but in no role list.
        assert!(!reg.network(net_id).unwrap().holds(junction));
    }

    #[test]
    fn hydrogen_tank_is_membership_only() {
        // Classified storage requires an oxygen (or untagged) subtype; a
        // hydrogen tank rides along like any other conveyor node.
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let h2_tank = grid.add_hydrogen_tank(100.0, 1.0);
        grid.link(gen, h2_tank);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen]);
        track_all(&mut reg, &grid, &[h2_tank]);

        let net_id = reg.network_of(h2_tank).unwrap();
        let network = reg.network(net_id).unwrap();
        assert!(!network.holds(h2_tank));
        assert!(network.storages().is_empty());
    }

    #[test]
    fn pending_queue_dedups() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);

        let mut reg = registry();
        reg.queue_add(gen);
        reg.queue_add(gen);
        assert_eq!(reg.pending_count(), 1);

        reg.process_pending(&grid);
        assert_eq!(reg.network_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn bridging_node_merges_two_networks() {
        let mut grid = TestGrid::new();
        let gen_a = grid.add_generator(10.0, 0.0);
        let gen_b = grid.add_generator(5.0, 0.0);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen_a]);
        track_all(&mut reg, &grid, &[gen_b]);
        assert_eq!(reg.network_count(), 2);

        // A tank reaching both generators bridges them.
        let tank = grid.add_tank(100.0, 0.5);
        grid.link(gen_a, tank);
        grid.link(gen_b, tank);
        let events = track_all(&mut reg, &grid, &[tank]);

        assert_eq!(reg.network_count(), 1);
        let target = reg.network_of(tank).unwrap();
        assert_eq!(reg.network_of(gen_a), Some(target));
        assert_eq!(reg.network_of(gen_b), Some(target));

        let network = reg.network(target).unwrap();
        assert!(network.holds(gen_a));
        assert!(network.holds(gen_b));
        assert!(network.holds(tank));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, LinkEvent::NetworksMerged { .. }))
        );
    }

    #[test]
    fn merge_folds_every_source_network() {
        // One bridging node reaching three separate networks leaves exactly
        // one network holding the union.
        let mut grid = TestGrid::new();
        let gens: Vec<_> = (0..3).map(|_| grid.add_generator(10.0, 0.0)).collect();

        let mut reg = registry();
        for &g in &gens {
            track_all(&mut reg, &grid, &[g]);
        }
        assert_eq!(reg.network_count(), 3);

        let tank = grid.add_tank(100.0, 0.5);
        for &g in &gens {
            grid.link(g, tank);
        }
        let events = track_all(&mut reg, &grid, &[tank]);

        assert_eq!(reg.network_count(), 1);
        let target = reg.network_of(tank).unwrap();
        let network = reg.network(target).unwrap();
        for &g in &gens {
            assert_eq!(reg.network_of(g), Some(target));
            assert!(network.holds(g));
        }
        let merges = events
            .iter()
            .filter(|e| matches!(e, LinkEvent::NetworksMerged { .. }))
            .count();
        assert_eq!(merges, 2);
    }

    #[test]
    fn merge_rewrites_membership_only_entries() {
        let mut grid = TestGrid::new();
        let gen_a = grid.add_generator(10.0, 0.0);
        let junction = grid.add_plain();
        grid.link(gen_a, junction);
        let gen_b = grid.add_generator(5.0, 0.0);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen_a]);
        track_all(&mut reg, &grid, &[junction]);
        track_all(&mut reg, &grid, &[gen_b]);
        assert_eq!(reg.network_count(), 2);

        let bridge = grid.add_tank(100.0, 0.5);
        grid.link(gen_a, bridge);
        grid.link(gen_b, bridge);
        track_all(&mut reg, &grid, &[bridge]);

        // The membership-only junction resolves to the merge target too.
        assert_eq!(reg.network_of(junction), reg.network_of(bridge));
    }

    #[test]
    fn unclassifiable_bridge_still_triggers_the_merge() {
        let mut grid = TestGrid::new();
        let gen_a = grid.add_generator(10.0, 0.0);
        let gen_b = grid.add_generator(5.0, 0.0);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen_a]);
        track_all(&mut reg, &grid, &[gen_b]);

        let junction = grid.add_plain();
        grid.link(gen_a, junction);
        grid.link(gen_b, junction);
        track_all(&mut reg, &grid, &[junction]);

        assert_eq!(reg.network_count(), 1);
        assert_eq!(reg.network_of(gen_a), reg.network_of(gen_b));
        assert_eq!(reg.network_of(junction), reg.network_of(gen_a));
    }

    #[test]
    fn merge_preserves_consumer_intent() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let thruster = grid.add_thruster(1.0);
        grid.set_enabled_raw(thruster, false); // player left it off

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen]);
        track_all(&mut reg, &grid, &[thruster]);
        assert_eq!(reg.network_count(), 2);

        let bridge = grid.add_tank(100.0, 0.5);
        grid.link(gen, bridge);
        grid.link(thruster, bridge);
        track_all(&mut reg, &grid, &[bridge]);

        let target = reg.network_of(bridge).unwrap();
        let consumer = reg
            .network(target)
            .unwrap()
            .consumers()
            .iter()
            .find(|c| c.node() == thruster)
            .unwrap();
        assert!(!consumer.wants_on());
    }

    // -----------------------------------------------------------------------
    // Remove / split / retire
    // -----------------------------------------------------------------------

    #[test]
    fn removing_the_last_members_retires_the_network() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let tank = grid.add_tank(100.0, 0.5);
        grid.link(gen, tank);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen, tank]);
        assert_eq!(reg.network_count(), 1);

        let events = reg.remove_node(&grid, gen);
        // Down to one member: retired, and the survivor is untracked.
        assert!(
            events
                .iter()
                .any(|e| matches!(e, LinkEvent::NetworkRetired { .. }))
        );
        assert_eq!(reg.network_count(), 0);
        assert!(!reg.is_tracked(tank));
    }

    #[test]
    fn removing_a_bridge_splits_the_network() {
        // [A(ref), B, C] where B carries all connectivity: removing B
        // leaves C unreachable, so C moves to a fresh network.
        let mut grid = TestGrid::new();
        let a = grid.add_generator(10.0, 0.0);
        let b = grid.add_tank(100.0, 0.5);
        let c = grid.add_thruster(1.0);
        grid.link(a, b);
        grid.link(b, c);
        grid.link(a, c);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[a, b, c]);
        assert_eq!(reg.network_count(), 1);
        let original = reg.network_of(a).unwrap();

        grid.unlink(a, c);
        grid.unlink(b, c);
        let events = reg.remove_node(&grid, b);

        assert_eq!(reg.network_count(), 2);
        let c_net = reg.network_of(c).unwrap();
        assert_ne!(c_net, original);
        assert_eq!(reg.network_of(a), Some(original));
        assert!(reg.network(c_net).unwrap().holds(c));
        assert!(!reg.network(original).unwrap().holds(c));
        assert!(matches!(
            events.as_slice(),
            [LinkEvent::NetworkSplit { moved, .. }] if moved == &vec![c]
        ));
    }

    #[test]
    fn split_partitions_the_prior_members() {
        // Two halves joined only through a coupler; losing it partitions
        // the member set exactly.
        let mut grid = TestGrid::new();
        let gen_a = grid.add_generator(10.0, 0.0);
        let tank_a = grid.add_tank(100.0, 0.5);
        let coupler = grid.add_plain();
        let gen_b = grid.add_generator(5.0, 0.0);
        let tank_b = grid.add_tank(50.0, 0.5);

        // Full mesh while the coupler is in place.
        let all = [gen_a, tank_a, coupler, gen_b, tank_b];
        for (i, &x) in all.iter().enumerate() {
            for &y in &all[i + 1..] {
                grid.link(x, y);
            }
        }

        let mut reg = registry();
        track_all(&mut reg, &grid, &all);
        assert_eq!(reg.network_count(), 1);

        // The coupler goes, and with it every cross-half link.
        for &x in &[gen_a, tank_a] {
            for &y in &[gen_b, tank_b] {
                grid.unlink(x, y);
                grid.unlink(y, x);
            }
        }
        reg.remove_node(&grid, coupler);

        assert_eq!(reg.network_count(), 2);
        assert_eq!(reg.network_of(gen_a), reg.network_of(tank_a));
        assert_eq!(reg.network_of(gen_b), reg.network_of(tank_b));
        assert_ne!(reg.network_of(gen_a), reg.network_of(gen_b));
    }

    #[test]
    fn removing_an_untracked_node_is_a_no_op() {
        let mut grid = TestGrid::new();
        let stray = grid.add_generator(10.0, 0.0);

        let mut reg = registry();
        let events = reg.remove_node(&grid, stray);
        assert!(events.is_empty());
    }

    #[test]
    fn removing_a_node_cancels_its_pending_add() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);

        let mut reg = registry();
        reg.queue_add(gen);
        reg.remove_node(&grid, gen);

        assert!(!reg.has_pending());
        reg.process_pending(&grid);
        assert_eq!(reg.network_count(), 0);
    }

    #[test]
    fn connected_survivors_stay_put() {
        let mut grid = TestGrid::new();
        let a = grid.add_generator(10.0, 0.0);
        let b = grid.add_tank(100.0, 0.5);
        let c = grid.add_thruster(1.0);
        grid.link(a, b);
        grid.link(a, c);
        grid.link(b, c);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[a, b, c]);
        let original = reg.network_of(a).unwrap();

        let events = reg.remove_node(&grid, b);
        assert!(events.is_empty());
        assert_eq!(reg.network_count(), 1);
        assert_eq!(reg.network_of(c), Some(original));
    }

    // -----------------------------------------------------------------------
    // Balance routing
    // -----------------------------------------------------------------------

    #[test]
    fn balance_all_serves_each_network_from_its_own_pool() {
        let mut grid = TestGrid::new();
        // Network 1: supplied.
        let gen = grid.add_generator(10.0, 0.0);
        let c1 = grid.add_thruster(4.0);
        grid.link(gen, c1);
        // Network 2: starved.
        let c2 = grid.add_thruster(4.0);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen, c1, c2]);
        assert_eq!(reg.network_count(), 2);

        let events = reg.balance_all(&mut grid, &mut (), fixed(1.0));

        assert!(grid.is_enabled(c1));
        assert!(!grid.is_enabled(c2));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn enabled_change_routes_to_the_owning_consumer() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let thruster = grid.add_thruster(4.0);
        grid.link(gen, thruster);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen, thruster]);

        grid.player_toggle(thruster, false);
        let (node, now_on) = grid.take_notification().unwrap();
        reg.on_enabled_changed(node, now_on);

        let net = reg.network_of(thruster).unwrap();
        let consumer = reg.network(net).unwrap().consumers().first().unwrap();
        assert!(!consumer.wants_on());
    }

    #[test]
    fn invalidate_all_drops_every_network_and_entry() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let tank = grid.add_tank(100.0, 0.5);
        grid.link(gen, tank);

        let mut reg = registry();
        track_all(&mut reg, &grid, &[gen, tank]);
        reg.queue_add(grid.add_thruster(1.0));

        reg.invalidate_all();
        assert_eq!(reg.network_count(), 0);
        assert!(!reg.is_tracked(gen));
        assert!(!reg.has_pending());
    }
}
