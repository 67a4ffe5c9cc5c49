//! Snapshot support for registry state.
//!
//! Serializes a [`NetworkRegistry`] (networks, index, pending queue, and
//! consumer intent bookkeeping) to `bitcode` bytes behind a versioned
//! header. Live equipment state is never captured -- it belongs to the
//! host and is re-read after a restore.

use serde::{Deserialize, Serialize};

use crate::fixed::Frames;
use crate::registry::NetworkRegistry;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a gaslink registry snapshot ("O2LK").
pub const SNAPSHOT_MAGIC: u32 = 0x4F32_4C4B;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur while decoding a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Header embedded in every snapshot. Checked before the payload is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Frame counter at the time the snapshot was taken.
    pub frame: Frames,
}

impl SnapshotHeader {
    pub fn new(frame: Frames) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            frame,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RegistrySnapshot {
    header: SnapshotHeader,
    registry: NetworkRegistry,
}

/// Serialize a registry (and the frame it was taken at) to bytes.
pub fn save_registry(registry: &NetworkRegistry, frame: Frames) -> Result<Vec<u8>, SerializeError> {
    let snapshot = RegistrySnapshot {
        header: SnapshotHeader::new(frame),
        registry: registry.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Restore a registry from bytes. Returns the registry and the frame the
/// snapshot was taken at.
pub fn load_registry(data: &[u8]) -> Result<(NetworkRegistry, Frames), DeserializeError> {
    let snapshot: RegistrySnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok((snapshot.registry, snapshot.header.frame))
}

// ===========================================================================
// Tests
// ===========================================================================
