//! Equipment classification and the three role adapters.
//!
//! A node plays at most one of three roles in a network: producer, storage,
//! or consumer. Classification is a pure function of the node's equipment
//! kind and subtype tag. The adapters wrap a [`NodeId`] and translate role
//! queries into live reads against the host's [`NodeIo`]; the consumer
//! adapter additionally carries the player-intent bookkeeping that keeps
//! automated toggles from clobbering an explicit shutdown.

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, non_negative, quantity_over};
use crate::id::NodeId;
use crate::port::{EnabledStateStore, NodeIo};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The terminal equipment kinds the engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentKind {
    /// Ice-fed gas generator.
    GasGenerator,
    /// Air vent; produces only while depressurizing a room.
    AirVent,
    /// Oxygen farm; produces only while it can grow.
    OxygenFarm,
    /// Gas tank. Only oxygen-subtype (or untagged) tanks are storage.
    GasTank,
    /// Thruster. Only hydrogen-subtype thrusters are consumers.
    Thruster,
    /// Power producer. Only hydrogen-engine subtypes are consumers.
    PowerProducer,
}

/// The role a classified node plays in a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Producer,
    Storage,
    Consumer,
}

/// Classify a node into at most one role.
///
/// Tanks qualify as storage when their subtype mentions `Oxygen` or is
/// untagged; thrusters and power producers qualify as consumers only for
/// hydrogen subtypes. Everything else is tracked for membership only.
pub fn classify(kind: EquipmentKind, subtype: &str) -> Option<Role> {
    match kind {
        EquipmentKind::GasGenerator | EquipmentKind::AirVent | EquipmentKind::OxygenFarm => {
            Some(Role::Producer)
        }
        EquipmentKind::GasTank => {
            if subtype.contains("Oxygen") || subtype.is_empty() {
                Some(Role::Storage)
            } else {
                None
            }
        }
        EquipmentKind::Thruster => {
            if subtype.contains("HydrogenThrust") {
                Some(Role::Consumer)
            } else {
                None
            }
        }
        EquipmentKind::PowerProducer => {
            if subtype.contains("HydrogenEngine") {
                Some(Role::Consumer)
            } else {
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Producer adapter
// ---------------------------------------------------------------------------

/// Wraps one gas generator, air vent, or oxygen farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OxygenProducer {
    node: NodeId,
    kind: EquipmentKind,
}

impl OxygenProducer {
    pub fn new(node: NodeId, kind: EquipmentKind) -> Self {
        Self { node, kind }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Actuation flag on; kind-specific gating is applied in [`production`].
    ///
    /// [`production`]: OxygenProducer::production
    pub fn is_working(&self, io: &impl NodeIo) -> bool {
        io.is_functional(self.node)
    }

    /// Litres this producer can add to the pool over `dt` seconds: spare
    /// output capacity times `dt`, never negative.
    pub fn production(&self, io: &impl NodeIo, dt: Fixed64) -> Fixed64 {
        if !io.is_functional(self.node) {
            return Fixed64::from_num(0);
        }
        match self.kind {
            EquipmentKind::AirVent if !io.is_depressurizing(self.node) => {
                return Fixed64::from_num(0);
            }
            EquipmentKind::OxygenFarm if !io.can_produce(self.node) => {
                return Fixed64::from_num(0);
            }
            _ => {}
        }
        let spare = io.max_oxygen_output(self.node) - io.current_oxygen_output(self.node);
        quantity_over(non_negative(spare), dt)
    }
}

// ---------------------------------------------------------------------------
// Storage adapter
// ---------------------------------------------------------------------------

/// Wraps one oxygen tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OxygenStorage {
    node: NodeId,
}

impl OxygenStorage {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Actuation flag on and not stockpiling. A stockpiling tank keeps its
    /// contents out of the available pool.
    pub fn is_working(&self, io: &impl NodeIo) -> bool {
        io.is_functional(self.node) && !io.is_stockpiling(self.node)
    }

    /// Litres currently held.
    pub fn stored(&self, io: &impl NodeIo) -> Fixed64 {
        io.filled_ratio(self.node) * io.tank_capacity(self.node)
    }

    /// Withdraw `amount` litres. The host clamps at empty.
    pub fn drain(&self, io: &mut impl NodeIo, amount: Fixed64) {
        io.drain_oxygen(self.node, amount);
    }
}

// ---------------------------------------------------------------------------
// Consumer adapter
// ---------------------------------------------------------------------------

/// Wraps one hydrogen thruster or hydrogen engine.
///
/// Two flags make automated supply control coexist with the player's own
/// switch: `wants_on` tracks what the player last asked for, and
/// `self_toggled` marks the next enabled-change notification as ours so it
/// is not read back as player intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OxygenConsumer {
    node: NodeId,
    /// What the player last asked for. Survives automated toggles.
    wants_on: bool,
    /// The next enabled-change notification originated from us. Single-shot.
    self_toggled: bool,
    /// Demand cache for the current tick. Not persisted.
    #[serde(skip)]
    cached_demand: Option<Fixed64>,
}

impl OxygenConsumer {
    /// Player intent is re-derived from the node's live enabled flag; there
    /// is no stored intent to recover after a reload or a network split.
    pub fn new(io: &impl NodeIo, node: NodeId) -> Self {
        Self {
            node,
            wants_on: io.is_enabled(node),
            self_toggled: false,
            cached_demand: None,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn wants_on(&self) -> bool {
        self.wants_on
    }

    pub fn is_working(&self, io: &impl NodeIo) -> bool {
        io.is_functional(self.node)
    }

    /// Clear the per-tick demand cache.
    pub fn begin_tick(&mut self) {
        self.cached_demand = None;
    }

    /// Litres of oxygen this consumer needs over `dt` seconds, derived from
    /// its hydrogen draw. Cached until [`begin_tick`].
    ///
    /// [`begin_tick`]: OxygenConsumer::begin_tick
    pub fn demand(&mut self, io: &impl NodeIo, o2_per_h2: Fixed64, dt: Fixed64) -> Fixed64 {
        if let Some(d) = self.cached_demand {
            return d;
        }
        let d = io.hydrogen_draw(self.node) * o2_per_h2 * dt;
        self.cached_demand = Some(d);
        d
    }

    /// Switch the node on. A no-op while the player has it switched off, so
    /// automated re-enable never overrides an explicit shutdown. Returns
    /// whether the flag actually flipped.
    pub fn enable<W: NodeIo, S: EnabledStateStore>(&mut self, io: &mut W, store: &mut S) -> bool {
        if !self.wants_on {
            return false;
        }
        if io.is_enabled(self.node) {
            return false;
        }
        self.self_toggled = true;
        io.set_enabled(self.node, true);
        store.record_enabled(self.node, true);
        true
    }

    /// Switch the node off. Returns whether the flag actually flipped.
    pub fn disable<W: NodeIo, S: EnabledStateStore>(&mut self, io: &mut W, store: &mut S) -> bool {
        if !io.is_enabled(self.node) {
            return false;
        }
        self.self_toggled = true;
        io.set_enabled(self.node, false);
        store.record_enabled(self.node, false);
        true
    }

    /// Host notification that the node's enabled flag changed. A change we
    /// caused consumes the single-shot flag; anything else is the player.
    pub fn on_enabled_changed(&mut self, now_enabled: bool) {
        if self.self_toggled {
            self.self_toggled = false;
            return;
        }
        self.wants_on = now_enabled;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
