//! One oxygen network: a maintained connected component of equipment nodes
//! sharing a single oxygen pool.
//!
//! A network owns its three role lists and nothing else. Connectivity is
//! answered by the host's [`ConveyorOracle`] against a single *reference
//! node* -- the engine never owns the conveyor graph. Consumers are kept in
//! stable insertion order; when supply runs short, earlier-added consumers
//! are served first.
//!
//! Invalidation is a normal terminal state, not an error: every operation on
//! an invalidated network short-circuits to a safe no-op or `false`, because
//! external code may still hold a handle to it for one more frame.

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::event::LinkEvent;
use crate::fixed::Fixed64;
use crate::id::{NetworkId, NodeId};
use crate::node::{OxygenConsumer, OxygenProducer, OxygenStorage, Role, classify};
use crate::port::{ConveyorOracle, EnabledStateStore, NodeIo};

// ---------------------------------------------------------------------------
// Integrity report
// ---------------------------------------------------------------------------

/// Result of a pairwise integrity sweep against the reference node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    /// Zero or one members; trivially consistent, never split.
    Empty,
    /// Every member still reaches the reference node.
    Connected,
    /// Members that no longer reach the reference node.
    ///
    /// The disconnected set is a single bucket: a removal that fractures the
    /// network into three or more groups coalesces every non-reference
    /// fragment into one, mutually disconnected or not.
    Split { disconnected: Vec<NodeId> },
}

// ---------------------------------------------------------------------------
// Detached role slot
// ---------------------------------------------------------------------------

/// A role slot detached from one network, pending insertion into another.
/// Moving slots (rather than re-creating them) preserves consumer intent
/// across merges and splits.
#[derive(Debug, Clone)]
pub enum RoleSlot {
    Producer(OxygenProducer),
    Storage(OxygenStorage),
    Consumer(OxygenConsumer),
}

impl RoleSlot {
    pub fn node(&self) -> NodeId {
        match self {
            RoleSlot::Producer(p) => p.node(),
            RoleSlot::Storage(s) => s.node(),
            RoleSlot::Consumer(c) => c.node(),
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// A single oxygen network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OxygenNetwork {
    id: NetworkId,
    /// Anchor for all pairwise connectivity queries. The first role node
    /// attached; replaced from the remaining members if removed.
    reference: Option<NodeId>,
    producers: Vec<OxygenProducer>,
    storages: Vec<OxygenStorage>,
    /// Stable insertion order; the tie-break for scarce supply.
    consumers: Vec<OxygenConsumer>,
    valid: bool,
}

impl OxygenNetwork {
    /// Create a new empty, valid network.
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            reference: None,
            producers: Vec::new(),
            storages: Vec::new(),
            consumers: Vec::new(),
            valid: true,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reference(&self) -> Option<NodeId> {
        self.reference
    }

    pub fn producers(&self) -> &[OxygenProducer] {
        &self.producers
    }

    pub fn storages(&self) -> &[OxygenStorage] {
        &self.storages
    }

    pub fn consumers(&self) -> &[OxygenConsumer] {
        &self.consumers
    }

    /// Number of nodes across all role lists.
    pub fn member_count(&self) -> usize {
        self.producers.len() + self.storages.len() + self.consumers.len()
    }

    /// All role-list nodes, producers first, then storages, then consumers.
    pub fn member_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.member_count());
        nodes.extend(self.producers.iter().map(|p| p.node()));
        nodes.extend(self.storages.iter().map(|s| s.node()));
        nodes.extend(self.consumers.iter().map(|c| c.node()));
        nodes
    }

    /// Whether any role list holds `node`.
    pub fn holds(&self, node: NodeId) -> bool {
        self.producers.iter().any(|p| p.node() == node)
            || self.storages.iter().any(|s| s.node() == node)
            || self.consumers.iter().any(|c| c.node() == node)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Whether `node` reaches this network's reference node. The oracle is
    /// queried both ways since it is not guaranteed symmetric. `false` for
    /// invalidated or empty networks.
    pub fn is_conveyor_connected(&self, oracle: &impl ConveyorOracle, node: NodeId) -> bool {
        if !self.valid {
            return false;
        }
        let Some(reference) = self.reference else {
            return false;
        };
        oracle.is_conveyor_connected(reference, node)
            || oracle.is_conveyor_connected(node, reference)
    }

    /// Classify `node` and append it to the matching role list, adopting it
    /// as the reference node if none is set. Unclassifiable nodes leave the
    /// role lists untouched. Returns `false` only when invalidated.
    pub fn try_add_node(&mut self, io: &impl NodeIo, node: NodeId) -> bool {
        if !self.valid {
            return false;
        }
        if self.holds(node) {
            return true;
        }
        if self.reference.is_none() {
            self.reference = Some(node);
        }
        let role = io.kind(node).and_then(|k| classify(k, &io.subtype(node)));
        match role {
            Some(Role::Producer) => {
                // kind() was Some, or classify would not have matched.
                if let Some(kind) = io.kind(node) {
                    self.producers.push(OxygenProducer::new(node, kind));
                }
            }
            Some(Role::Storage) => self.storages.push(OxygenStorage::new(node)),
            Some(Role::Consumer) => self.consumers.push(OxygenConsumer::new(io, node)),
            None => {}
        }
        true
    }

    /// Insert a detached role slot, adopting its node as the reference if
    /// none is set. Returns `false` only when invalidated.
    pub fn insert_slot(&mut self, slot: RoleSlot) -> bool {
        if !self.valid {
            return false;
        }
        let node = slot.node();
        if self.holds(node) {
            return true;
        }
        if self.reference.is_none() {
            self.reference = Some(node);
        }
        match slot {
            RoleSlot::Producer(p) => self.producers.push(p),
            RoleSlot::Storage(s) => self.storages.push(s),
            RoleSlot::Consumer(c) => self.consumers.push(c),
        }
        true
    }

    /// Detach `node`'s role slot, fixing up the reference node if needed.
    pub fn take_slot(&mut self, node: NodeId) -> Option<RoleSlot> {
        if !self.valid {
            return None;
        }
        let slot = if let Some(i) = self.producers.iter().position(|p| p.node() == node) {
            Some(RoleSlot::Producer(self.producers.remove(i)))
        } else if let Some(i) = self.storages.iter().position(|s| s.node() == node) {
            Some(RoleSlot::Storage(self.storages.remove(i)))
        } else if let Some(i) = self.consumers.iter().position(|c| c.node() == node) {
            Some(RoleSlot::Consumer(self.consumers.remove(i)))
        } else {
            None
        };
        if self.reference == Some(node) {
            self.reference = self.pick_reference();
        }
        slot
    }

    /// Remove `node` from whichever role list holds it. If it was the
    /// reference node, a replacement is chosen from the remaining members:
    /// first producer, else first storage, else first consumer.
    pub fn remove_node(&mut self, node: NodeId) {
        let _ = self.take_slot(node);
    }

    fn pick_reference(&self) -> Option<NodeId> {
        self.producers
            .first()
            .map(|p| p.node())
            .or_else(|| self.storages.first().map(|s| s.node()))
            .or_else(|| self.consumers.first().map(|c| c.node()))
    }

    /// Move every role slot out of this network, leaving it empty. Used by
    /// the registry's merge fold; the drained network is invalidated next.
    pub fn drain_slots(&mut self) -> Vec<RoleSlot> {
        let mut slots = Vec::with_capacity(self.member_count());
        slots.extend(self.producers.drain(..).map(RoleSlot::Producer));
        slots.extend(self.storages.drain(..).map(RoleSlot::Storage));
        slots.extend(self.consumers.drain(..).map(RoleSlot::Consumer));
        slots
    }

    /// Pairwise integrity sweep: every member is checked against the
    /// reference node, both query directions. Members already confirmed
    /// disconnected are not re-verified against each other.
    pub fn check_integrity(&self, oracle: &impl ConveyorOracle) -> Integrity {
        if !self.valid || self.reference.is_none() {
            return Integrity::Empty;
        }
        let members = self.member_nodes();
        if members.len() <= 1 {
            return Integrity::Empty;
        }
        let mut disconnected: Vec<NodeId> = Vec::new();
        for node in members {
            if Some(node) == self.reference || disconnected.contains(&node) {
                continue;
            }
            if !self.is_conveyor_connected(oracle, node) {
                disconnected.push(node);
            }
        }
        if disconnected.is_empty() {
            Integrity::Connected
        } else {
            Integrity::Split { disconnected }
        }
    }

    /// Clear all role lists and mark the network permanently unusable.
    /// Idempotent.
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.producers.clear();
        self.storages.clear();
        self.consumers.clear();
    }

    /// Route a host enabled-changed notification to the owning consumer
    /// slot. Returns whether a consumer was found.
    pub fn notify_enabled_changed(&mut self, node: NodeId, now_enabled: bool) -> bool {
        for consumer in &mut self.consumers {
            if consumer.node() == node {
                consumer.on_enabled_changed(now_enabled);
                return true;
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Balancing
    // -----------------------------------------------------------------------

    /// Run one balance pass over this network.
    ///
    /// 1. Sum production over working producers.
    /// 2. Sum the available pool over working storages (stockpiling tanks
    ///    contribute nothing even though they still hold oxygen).
    /// 3. Serve consumers in insertion order: production first, then an
    ///    optimistic claim against the storage pool (strictly-greater check);
    ///    a consumer that cannot be covered is switched off.
    /// 4. Recovery: consumers we shut down earlier (player intent still on)
    ///    are offered the leftovers, again in insertion order; those whose
    ///    demand now fits are switched back on. A failed recovery leaves
    ///    the pools untouched.
    /// 5. Withdraw the claimed total from the storage list in list order.
    ///    This pass walks *all* storages, stockpiling ones included -- the
    ///    availability check and the drain intentionally cover different
    ///    subsets.
    pub fn balance<W: NodeIo, S: EnabledStateStore>(
        &mut self,
        io: &mut W,
        store: &mut S,
        cfg: &LinkConfig,
        dt: Fixed64,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        if !self.valid {
            return events;
        }
        let zero = Fixed64::from_num(0);

        let mut production = zero;
        for producer in &self.producers {
            if producer.is_working(io) {
                production += producer.production(io, dt);
            }
        }

        let mut storage_pool = zero;
        for storage in &self.storages {
            if storage.is_working(io) {
                storage_pool += storage.stored(io);
            }
        }

        let mut consumed_from_storage = zero;
        let network_id = self.id;
        for consumer in &mut self.consumers {
            consumer.begin_tick();
            if !consumer.is_working(io) {
                continue;
            }
            let mut need = consumer.demand(io, cfg.o2_per_h2, dt);

            if production >= need {
                production -= need;
                need = zero;
            } else {
                need -= production;
                production = zero;
            }
            if need > zero && storage_pool > need {
                consumed_from_storage += need;
                storage_pool -= need;
                need = zero;
            }

            if need > zero {
                if consumer.disable(io, store) {
                    events.push(LinkEvent::ConsumerShutdown {
                        network: network_id,
                        node: consumer.node(),
                        shortfall: need,
                    });
                }
                continue;
            }
            if consumer.enable(io, store) {
                events.push(LinkEvent::ConsumerRestored {
                    network: network_id,
                    node: consumer.node(),
                });
            }
        }

        // Recovery pass. Only consumers whose shutdown originated here are
        // candidates: the player-off ones have `wants_on` false.
        for consumer in &mut self.consumers {
            if io.is_enabled(consumer.node()) || !consumer.wants_on() {
                continue;
            }
            let need = consumer.demand(io, cfg.o2_per_h2, dt);
            let from_production = if production < need { production } else { need };
            let remainder = need - from_production;
            if remainder > zero && storage_pool <= remainder {
                continue;
            }
            production -= from_production;
            if remainder > zero {
                consumed_from_storage += remainder;
                storage_pool -= remainder;
            }
            if consumer.enable(io, store) {
                events.push(LinkEvent::ConsumerRestored {
                    network: network_id,
                    node: consumer.node(),
                });
            }
        }

        // Authoritative drain, list order, no working filter.
        let mut remaining = consumed_from_storage;
        for storage in &self.storages {
            if remaining <= zero {
                break;
            }
            let current = storage.stored(io);
            if current <= zero {
                continue;
            }
            let take = if remaining > current { current } else { remaining };
            storage.drain(io, take);
            remaining -= take;
        }

        events
    }
}

// ===========================================================================
// Tests
// ===========================================================================
