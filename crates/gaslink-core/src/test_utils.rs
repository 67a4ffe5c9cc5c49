//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so they are
//! available everywhere the engine is exercised. [`TestGrid`] is an
//! in-memory host: it implements every port trait over a slotmap of fake
//! equipment nodes and a directed link set, and buffers the enabled-change
//! notifications a real host would fire back at the engine.

use std::collections::HashSet;

use slotmap::SlotMap;

use crate::config::LinkConfig;
use crate::event::LinkEvent;
use crate::fixed::{Fixed64, non_negative};
use crate::id::NodeId;
use crate::node::EquipmentKind;
use crate::port::{ConveyorOracle, EnabledStateStore, NodeIo};
use crate::registry::NetworkRegistry;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// A config with a 1:1 conversion ratio and no scheduling delays, so test
/// arithmetic reads off the page.
pub fn test_config() -> LinkConfig {
    LinkConfig {
        o2_per_h2: fixed(1.0),
        debounce_frames: 0,
        balance_interval_frames: 1,
        frame_step_seconds: fixed(1.0),
    }
}

/// Queue `nodes` and classify them as one batch, bypassing the driver.
pub fn track_all(
    registry: &mut NetworkRegistry,
    grid: &TestGrid,
    nodes: &[NodeId],
) -> Vec<LinkEvent> {
    for &node in nodes {
        registry.queue_add(node);
    }
    registry.process_pending(grid)
}

// ===========================================================================
// Fake equipment
// ===========================================================================

/// One fake equipment node.
#[derive(Debug, Clone)]
pub struct TestNode {
    pub kind: Option<EquipmentKind>,
    pub subtype: String,
    pub enabled: bool,
    pub intact: bool,
    // producer
    pub max_output: Fixed64,
    pub current_output: Fixed64,
    pub depressurizing: bool,
    pub can_produce: bool,
    // storage
    pub capacity: Fixed64,
    pub filled_ratio: Fixed64,
    pub stockpiling: bool,
    // consumer
    pub hydrogen_draw: Fixed64,
}

impl Default for TestNode {
    fn default() -> Self {
        Self {
            kind: None,
            subtype: String::new(),
            enabled: true,
            intact: true,
            max_output: fixed(0.0),
            current_output: fixed(0.0),
            depressurizing: true,
            can_produce: true,
            capacity: fixed(0.0),
            filled_ratio: fixed(0.0),
            stockpiling: false,
            hydrogen_draw: fixed(0.0),
        }
    }
}

/// In-memory host: equipment nodes, a directed conveyor link set, and a
/// buffer of the enabled-change notifications a real host would deliver.
#[derive(Debug, Default)]
pub struct TestGrid {
    pub nodes: SlotMap<NodeId, TestNode>,
    links: HashSet<(NodeId, NodeId)>,
    notifications: Vec<(NodeId, bool)>,
}

impl TestGrid {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn add_generator(&mut self, max_output: f64, current_output: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::GasGenerator),
            max_output: fixed(max_output),
            current_output: fixed(current_output),
            ..Default::default()
        })
    }

    pub fn add_vent(&mut self, max_output: f64, current_output: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::AirVent),
            max_output: fixed(max_output),
            current_output: fixed(current_output),
            ..Default::default()
        })
    }

    pub fn add_farm(&mut self, max_output: f64, current_output: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::OxygenFarm),
            max_output: fixed(max_output),
            current_output: fixed(current_output),
            ..Default::default()
        })
    }

    pub fn add_tank(&mut self, capacity: f64, filled_ratio: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::GasTank),
            subtype: "OxygenTank".to_string(),
            capacity: fixed(capacity),
            filled_ratio: fixed(filled_ratio),
            ..Default::default()
        })
    }

    /// A tank that fails the oxygen-subtype match; never classified.
    pub fn add_hydrogen_tank(&mut self, capacity: f64, filled_ratio: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::GasTank),
            subtype: "HydrogenTank".to_string(),
            capacity: fixed(capacity),
            filled_ratio: fixed(filled_ratio),
            ..Default::default()
        })
    }

    pub fn add_thruster(&mut self, hydrogen_draw: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::Thruster),
            subtype: "LargeHydrogenThrust".to_string(),
            hydrogen_draw: fixed(hydrogen_draw),
            ..Default::default()
        })
    }

    pub fn add_engine(&mut self, hydrogen_draw: f64) -> NodeId {
        self.nodes.insert(TestNode {
            kind: Some(EquipmentKind::PowerProducer),
            subtype: "HydrogenEngine".to_string(),
            hydrogen_draw: fixed(hydrogen_draw),
            ..Default::default()
        })
    }

    /// A node with no equipment kind: conveyor plumbing, tracked for
    /// membership only.
    pub fn add_plain(&mut self) -> NodeId {
        self.nodes.insert(TestNode::default())
    }

    /// Drop a node and every link touching it.
    pub fn destroy(&mut self, node: NodeId) {
        self.nodes.remove(node);
        self.links.retain(|(a, b)| *a != node && *b != node);
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    /// Add a one-directional conveyor link. The engine queries both
    /// directions, so a single direction is enough to connect.
    pub fn link(&mut self, from: NodeId, to: NodeId) {
        self.links.insert((from, to));
    }

    /// Remove the link in both directions.
    pub fn unlink(&mut self, a: NodeId, b: NodeId) {
        self.links.remove(&(a, b));
        self.links.remove(&(b, a));
    }

    // -----------------------------------------------------------------------
    // State pokes
    // -----------------------------------------------------------------------

    /// Set the enabled flag without firing a notification. Models state that
    /// predates tracking (e.g. how the world was saved).
    pub fn set_enabled_raw(&mut self, node: NodeId, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.enabled = enabled;
        }
    }

    /// The player flips the switch: sets the flag and fires a notification.
    pub fn player_toggle(&mut self, node: NodeId, enabled: bool) {
        let mut changed = false;
        if let Some(n) = self.nodes.get_mut(node) {
            changed = n.enabled != enabled;
            n.enabled = enabled;
        }
        if changed {
            self.notifications.push((node, enabled));
        }
    }

    pub fn set_intact(&mut self, node: NodeId, intact: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.intact = intact;
        }
    }

    pub fn set_depressurizing(&mut self, node: NodeId, on: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.depressurizing = on;
        }
    }

    pub fn set_can_produce(&mut self, node: NodeId, on: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.can_produce = on;
        }
    }

    pub fn set_stockpiling(&mut self, node: NodeId, on: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.stockpiling = on;
        }
    }

    pub fn set_hydrogen_draw(&mut self, node: NodeId, rate: f64) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.hydrogen_draw = fixed(rate);
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Litres currently held by a tank, as f64 for assertions.
    pub fn stored(&self, node: NodeId) -> f64 {
        match self.nodes.get(node) {
            Some(n) => (n.filled_ratio * n.capacity).to_num::<f64>(),
            None => 0.0,
        }
    }

    /// Pop the oldest buffered enabled-change notification.
    pub fn take_notification(&mut self) -> Option<(NodeId, bool)> {
        if self.notifications.is_empty() {
            None
        } else {
            Some(self.notifications.remove(0))
        }
    }

    /// Deliver every buffered notification into the registry, oldest first.
    pub fn deliver_notifications(&mut self, registry: &mut NetworkRegistry) {
        for (node, enabled) in self.notifications.drain(..) {
            registry.on_enabled_changed(node, enabled);
        }
    }
}

// ===========================================================================
// Port implementations
// ===========================================================================

impl ConveyorOracle for TestGrid {
    fn is_conveyor_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.links.contains(&(a, b))
    }
}

impl NodeIo for TestGrid {
    fn kind(&self, node: NodeId) -> Option<EquipmentKind> {
        self.nodes.get(node).and_then(|n| n.kind)
    }

    fn subtype(&self, node: NodeId) -> String {
        self.nodes
            .get(node)
            .map(|n| n.subtype.clone())
            .unwrap_or_default()
    }

    fn is_functional(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .map(|n| n.enabled && n.intact)
            .unwrap_or(false)
    }

    fn max_oxygen_output(&self, node: NodeId) -> Fixed64 {
        self.nodes
            .get(node)
            .map(|n| n.max_output)
            .unwrap_or_else(|| fixed(0.0))
    }

    fn current_oxygen_output(&self, node: NodeId) -> Fixed64 {
        self.nodes
            .get(node)
            .map(|n| n.current_output)
            .unwrap_or_else(|| fixed(0.0))
    }

    fn is_depressurizing(&self, node: NodeId) -> bool {
        self.nodes.get(node).map(|n| n.depressurizing).unwrap_or(false)
    }

    fn can_produce(&self, node: NodeId) -> bool {
        self.nodes.get(node).map(|n| n.can_produce).unwrap_or(false)
    }

    fn tank_capacity(&self, node: NodeId) -> Fixed64 {
        self.nodes
            .get(node)
            .map(|n| n.capacity)
            .unwrap_or_else(|| fixed(0.0))
    }

    fn filled_ratio(&self, node: NodeId) -> Fixed64 {
        self.nodes
            .get(node)
            .map(|n| n.filled_ratio)
            .unwrap_or_else(|| fixed(0.0))
    }

    fn is_stockpiling(&self, node: NodeId) -> bool {
        self.nodes.get(node).map(|n| n.stockpiling).unwrap_or(false)
    }

    fn drain_oxygen(&mut self, node: NodeId, amount: Fixed64) {
        if let Some(n) = self.nodes.get_mut(node) {
            if n.capacity > fixed(0.0) {
                let ratio_drop = amount / n.capacity;
                n.filled_ratio = non_negative(n.filled_ratio - ratio_drop);
            }
        }
    }

    fn hydrogen_draw(&self, node: NodeId) -> Fixed64 {
        self.nodes
            .get(node)
            .map(|n| n.hydrogen_draw)
            .unwrap_or_else(|| fixed(0.0))
    }

    fn is_enabled(&self, node: NodeId) -> bool {
        self.nodes.get(node).map(|n| n.enabled).unwrap_or(false)
    }

    fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        let mut changed = false;
        if let Some(n) = self.nodes.get_mut(node) {
            changed = n.enabled != enabled;
            n.enabled = enabled;
        }
        // A real host fires the change notification back at the engine.
        if changed {
            self.notifications.push((node, enabled));
        }
    }
}

// ===========================================================================
// Recording store
// ===========================================================================

/// An [`EnabledStateStore`] that remembers every write, in order.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub records: Vec<(NodeId, bool)>,
}

impl EnabledStateStore for RecordingStore {
    fn record_enabled(&mut self, node: NodeId, enabled: bool) {
        self.records.push((node, enabled));
    }
}
