//! Frame driver: adapts the host's per-frame callback to the engine's two
//! cadences.
//!
//! Topology adds are debounced -- every queued add pushes a shared deadline
//! out by `debounce_frames`, so a burst of additions (world load, blueprint
//! paste) settles as one batch. Removals bypass the queue entirely. The
//! balance pass runs every `balance_interval_frames`, always after any due
//! batch in the same frame, so networks are structurally settled before
//! flow is computed.

use serde::{Deserialize, Serialize};

use crate::event::LinkEvent;
use crate::fixed::Frames;
use crate::id::NodeId;
use crate::port::{ConveyorOracle, EnabledStateStore, NodeIo};
use crate::registry::NetworkRegistry;

/// Per-structure frame driver. One per [`NetworkRegistry`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameDriver {
    frame: Frames,
    /// Frame at which the pending batch becomes due. Pushed out again by
    /// every new add.
    batch_due: Option<Frames>,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Frames {
        self.frame
    }

    /// Queue a newly-seen node and push the batch deadline out.
    pub fn node_added(&mut self, registry: &mut NetworkRegistry, node: NodeId) {
        registry.queue_add(node);
        self.batch_due = Some(self.frame + registry.config().debounce_frames);
    }

    /// Removals are processed immediately, never batched, so a balance pass
    /// cannot observe a node that no longer exists.
    pub fn node_removed<H: ConveyorOracle + NodeIo>(
        &mut self,
        registry: &mut NetworkRegistry,
        host: &H,
        node: NodeId,
    ) -> Vec<LinkEvent> {
        registry.remove_node(host, node)
    }

    /// Advance one host frame: drain a due batch, then run the balance pass
    /// if its interval elapsed.
    pub fn on_frame<H, S>(
        &mut self,
        registry: &mut NetworkRegistry,
        host: &mut H,
        store: &mut S,
    ) -> Vec<LinkEvent>
    where
        H: ConveyorOracle + NodeIo,
        S: EnabledStateStore,
    {
        self.frame += 1;
        let mut events = Vec::new();

        if let Some(due) = self.batch_due {
            if self.frame >= due {
                events.extend(registry.process_pending(&*host));
                self.batch_due = None;
            }
        }

        let interval = registry.config().balance_interval_frames;
        if interval > 0 && self.frame % interval == 0 {
            let dt = registry.config().balance_dt();
            events.extend(registry.balance_all(host, store, dt));
        }
        events
    }
}

// ===========================================================================
// Tests
// ===========================================================================
