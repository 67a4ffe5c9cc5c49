//! Multi-structure bookkeeping.
//!
//! A session tracks one registry and frame driver per structure in the
//! world. Structures never share networks: nodes on different structures
//! are routed through different registries, and a structure leaving the
//! world tears its registry down in one call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::event::LinkEvent;
use crate::id::{NodeId, StructureId};
use crate::port::{ConveyorOracle, EnabledStateStore, NodeIo};
use crate::registry::NetworkRegistry;
use crate::scheduler::FrameDriver;

/// One tracked structure: its registry and frame driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub registry: NetworkRegistry,
    pub driver: FrameDriver,
}

/// Tracks every structure in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    cfg: LinkConfig,
    structures: BTreeMap<StructureId, Structure>,
}

impl Session {
    pub fn new(cfg: LinkConfig) -> Self {
        Self {
            cfg,
            structures: BTreeMap::new(),
        }
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    /// Begin tracking a structure. Re-adding an already-tracked structure
    /// leaves its state untouched.
    pub fn structure_added(&mut self, id: StructureId) {
        self.structures.entry(id).or_insert_with(|| Structure {
            registry: NetworkRegistry::new(self.cfg.clone()),
            driver: FrameDriver::new(),
        });
    }

    /// Stop tracking a structure: its networks are invalidated before the
    /// registry is dropped, so lingering handles go quiet rather than stale.
    pub fn structure_removed(&mut self, id: StructureId) {
        if let Some(mut structure) = self.structures.remove(&id) {
            structure.registry.invalidate_all();
        }
    }

    /// A node appeared on `structure`.
    pub fn node_added(&mut self, structure: StructureId, node: NodeId) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.driver.node_added(&mut s.registry, node);
        }
    }

    /// A node disappeared from `structure`. Processed immediately.
    pub fn node_removed<H: ConveyorOracle + NodeIo>(
        &mut self,
        structure: StructureId,
        host: &H,
        node: NodeId,
    ) -> Vec<LinkEvent> {
        match self.structures.get_mut(&structure) {
            Some(s) => s.driver.node_removed(&mut s.registry, host, node),
            None => Vec::new(),
        }
    }

    /// Route a host enabled-changed notification.
    pub fn on_enabled_changed(&mut self, structure: StructureId, node: NodeId, now_enabled: bool) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.registry.on_enabled_changed(node, now_enabled);
        }
    }

    /// Advance every structure by one host frame, in structure-id order.
    pub fn on_frame<H, S>(&mut self, host: &mut H, store: &mut S) -> Vec<LinkEvent>
    where
        H: ConveyorOracle + NodeIo,
        S: EnabledStateStore,
    {
        let mut events = Vec::new();
        for structure in self.structures.values_mut() {
            events.extend(structure.driver.on_frame(&mut structure.registry, host, store));
        }
        events
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestGrid, test_config};

    #[test]
    fn structures_are_tracked_independently() {
        let mut grid = TestGrid::new();
        let gen_a = grid.add_generator(10.0, 0.0);
        let gen_b = grid.add_generator(5.0, 0.0);

        let mut session = Session::new(test_config());
        session.structure_added(StructureId(1));
        session.structure_added(StructureId(2));
        session.node_added(StructureId(1), gen_a);
        session.node_added(StructureId(2), gen_b);

        for _ in 0..test_config().debounce_frames + 1 {
            session.on_frame(&mut grid, &mut ());
        }

        let reg_a = &session.structure(StructureId(1)).unwrap().registry;
        let reg_b = &session.structure(StructureId(2)).unwrap().registry;
        assert!(reg_a.is_tracked(gen_a));
        assert!(!reg_a.is_tracked(gen_b));
        assert!(reg_b.is_tracked(gen_b));
    }

    #[test]
    fn re_adding_a_structure_keeps_its_state() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);

        let mut session = Session::new(test_config());
        session.structure_added(StructureId(7));
        session.node_added(StructureId(7), gen);
        session.structure_added(StructureId(7));

        let reg = &session.structure(StructureId(7)).unwrap().registry;
        assert!(reg.has_pending());
    }

    #[test]
    fn removing_a_structure_tears_it_down() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);
        let tank = grid.add_tank(100.0, 0.5);
        grid.link(gen, tank);

        let mut session = Session::new(test_config());
        session.structure_added(StructureId(1));
        session.node_added(StructureId(1), gen);
        session.node_added(StructureId(1), tank);
        for _ in 0..test_config().debounce_frames + 1 {
            session.on_frame(&mut grid, &mut ());
        }

        session.structure_removed(StructureId(1));
        assert_eq!(session.structure_count(), 0);
        assert!(session.structure(StructureId(1)).is_none());
    }

    #[test]
    fn events_for_unknown_structures_are_ignored() {
        let mut grid = TestGrid::new();
        let gen = grid.add_generator(10.0, 0.0);

        let mut session = Session::new(test_config());
        session.node_added(StructureId(9), gen);
        let events = session.node_removed(StructureId(9), &grid, gen);
        assert!(events.is_empty());
        assert_eq!(session.structure_count(), 0);
    }
}
