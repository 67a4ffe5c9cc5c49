//! Gaslink Core -- dynamic oxygen-network tracking and balancing for
//! conveyor-connected equipment.
//!
//! The engine watches equipment nodes come and go on a structure, maintains
//! a partition of them into connected *networks* (merge-on-join,
//! split-on-leave), and balances one oxygen pool per network every tick:
//! producers first, tank storage second, and consumers that cannot be
//! covered are switched off -- without ever clobbering the player's own
//! on/off intent.
//!
//! # Two Cadences
//!
//! Driven from the host's per-frame callback via [`scheduler::FrameDriver`]:
//!
//! 1. **Topology batch** -- newly-seen nodes wait out a debounce window,
//!    then the whole burst is classified against the live networks in one
//!    pass (join, create, or merge). Removals skip the queue and are
//!    repaired immediately (retire or split).
//! 2. **Balance tick** -- every `balance_interval_frames`, each network
//!    runs the production/storage/consumer pass in consumer insertion
//!    order.
//!
//! # Connectivity
//!
//! The engine owns no conveyor graph. Membership rests entirely on the
//! host's pairwise [`port::ConveyorOracle`], queried between each network's
//! *reference node* and the node in question. One consequence is inherited
//! and documented: a removal that fractures a network into three or more
//! groups buckets every non-reference fragment into a single new network.
//!
//! # Key Types
//!
//! - [`registry::NetworkRegistry`] -- owns the node-to-network index and the
//!   live network set; the single entry point for topology changes.
//! - [`network::OxygenNetwork`] -- one connected component and its balance
//!   pass.
//! - [`node`] -- equipment classification and the producer / storage /
//!   consumer adapters.
//! - [`port`] -- the traits the host implements: oracle, equipment I/O,
//!   commanded-state store.
//! - [`scheduler::FrameDriver`] / [`session::Session`] -- frame cadence and
//!   multi-structure bookkeeping.
//! - [`serialize`] -- versioned bitcode snapshots of registry state.

pub mod config;
pub mod event;
pub mod fixed;
pub mod id;
pub mod network;
pub mod node;
pub mod port;
pub mod registry;
pub mod scheduler;
pub mod serialize;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
