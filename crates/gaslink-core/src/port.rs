//! External interface traits.
//!
//! The engine owns no equipment state and no conveyor topology. Everything it
//! knows about the physical world comes through these traits, implemented by
//! the host simulation. Queries for a capability a node does not have must
//! yield `0`/`false` rather than failing; the balance pass is total.

use crate::fixed::Fixed64;
use crate::id::NodeId;
use crate::node::EquipmentKind;

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Pairwise conveyor-connectivity predicate.
///
/// The engine never walks the conveyor graph itself; it only ever asks
/// whether two specific nodes share a transport path. Implementations are
/// not required to be symmetric -- callers query both directions.
pub trait ConveyorOracle {
    /// Whether a conveyor path exists from `a` to `b`.
    fn is_conveyor_connected(&self, a: NodeId, b: NodeId) -> bool;
}

// ---------------------------------------------------------------------------
// Equipment query / actuation
// ---------------------------------------------------------------------------

/// Query and actuation surface over a structure's equipment.
///
/// All reads are live: output rates, fill levels, and fuel draw change from
/// tick to tick under the host's own simulation. `set_enabled` is the only
/// mutation the engine performs.
pub trait NodeIo {
    /// The node's equipment kind, or `None` for nodes that are not terminal
    /// equipment (tracked for membership only).
    fn kind(&self, node: NodeId) -> Option<EquipmentKind>;

    /// The node's subtype tag, e.g. `"OxygenTankSmall"`. Empty when untagged.
    fn subtype(&self, node: NodeId) -> String;

    /// Whether the node is intact and its on/off flag is on.
    fn is_functional(&self, node: NodeId) -> bool;

    // -- producers --

    /// Maximum oxygen output rate in litres per second.
    fn max_oxygen_output(&self, node: NodeId) -> Fixed64;

    /// Oxygen output rate currently claimed by the host's own distribution,
    /// in litres per second.
    fn current_oxygen_output(&self, node: NodeId) -> Fixed64;

    /// Whether an air vent is venting room air into the conveyor system.
    fn is_depressurizing(&self, node: NodeId) -> bool;

    /// Whether an oxygen farm currently has what it needs to produce.
    fn can_produce(&self, node: NodeId) -> bool;

    // -- storage --

    /// Tank capacity in litres.
    fn tank_capacity(&self, node: NodeId) -> Fixed64;

    /// Tank fill level as a ratio in `[0, 1]`.
    fn filled_ratio(&self, node: NodeId) -> Fixed64;

    /// Whether a tank is stockpiling (filling only, withheld from the pool).
    fn is_stockpiling(&self, node: NodeId) -> bool;

    /// Withdraw `amount` litres from a tank. Implementations clamp at empty.
    fn drain_oxygen(&mut self, node: NodeId, amount: Fixed64);

    // -- consumers --

    /// Hydrogen drawn by the node right now, in litres per second.
    fn hydrogen_draw(&self, node: NodeId) -> Fixed64;

    /// The node's on/off flag.
    fn is_enabled(&self, node: NodeId) -> bool;

    /// Flip the node's on/off flag. Hosts fire an enabled-changed
    /// notification back at the engine when the flag actually changes.
    fn set_enabled(&mut self, node: NodeId, enabled: bool);
}

// ---------------------------------------------------------------------------
// Commanded-state persistence
// ---------------------------------------------------------------------------

/// Sink for the last commanded enabled state per node.
///
/// Hosts that persist this can restore the flag across a reload; the engine
/// only writes it and never reads it back (player intent is re-derived from
/// the live enabled flag instead).
pub trait EnabledStateStore {
    /// Record that `node` was commanded to `enabled`.
    fn record_enabled(&mut self, node: NodeId, enabled: bool);
}

/// No-op store for hosts without persistence.
impl EnabledStateStore for () {
    fn record_enabled(&mut self, _node: NodeId, _enabled: bool) {}
}
