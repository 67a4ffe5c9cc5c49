//! Typed diagnostic events.
//!
//! Every structural transition (create/attach/merge/split/retire) and every
//! consumer actuation flip is reported as a [`LinkEvent`] returned from the
//! call that produced it. Consumer events fire only on *transitions* -- a
//! consumer that stays shut down produces no further events.

use crate::fixed::Fixed64;
use crate::id::{NetworkId, NodeId};
use crate::node::Role;

/// An engine event. Returned synchronously from topology and balance calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A node could not reach any live network; a new one was created for it.
    NetworkCreated {
        network: NetworkId,
        reference: NodeId,
    },
    /// A classified node joined a network's role list.
    NodeAttached {
        network: NetworkId,
        node: NodeId,
        role: Role,
    },
    /// A bridging add folded `source` into `target`; `source` is gone.
    NetworksMerged {
        source: NetworkId,
        target: NetworkId,
    },
    /// A removal disconnected `moved` from `source`; they now live in `created`.
    NetworkSplit {
        source: NetworkId,
        created: NetworkId,
        moved: Vec<NodeId>,
    },
    /// A network dropped to one member or fewer and was retired.
    NetworkRetired { network: NetworkId },
    /// A consumer could not be supplied and was switched off.
    ConsumerShutdown {
        network: NetworkId,
        node: NodeId,
        /// Litres of unmet demand this tick.
        shortfall: Fixed64,
    },
    /// A previously shut-down consumer was switched back on.
    ConsumerRestored { network: NetworkId, node: NodeId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_compare_by_value() {
        let a = LinkEvent::NetworkRetired {
            network: NetworkId(3),
        };
        let b = LinkEvent::NetworkRetired {
            network: NetworkId(3),
        };
        assert_eq!(a, b);
    }
}
