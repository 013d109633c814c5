//! Snapshot Module
//!
//! Full-state persistence for the engine: one file per engine instance,
//! rewritten whole on every dump.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Header (18 bytes)                                                │
//! │   Magic: "SKVS" (4) | Version: u16 (2) | PayloadLen: u64 (8)     │
//! │   PayloadCRC: u32 (4)                                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Payload (PayloadLen bytes)                                       │
//! │   bincode(SnapshotData)                                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry instants are stored as absolute Unix milliseconds. A snapshot
//! loaded later keeps the original deadlines; it does not restart the TTLs.

mod reader;
mod writer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::value::Value;

pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;

// =============================================================================
// Shared Constants (used by reader and writer)
// =============================================================================

/// Magic bytes identifying a stashkv snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"SKVS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + PayloadLen (8) + CRC (4) = 18 bytes
pub const HEADER_SIZE: usize = 18;

/// Nested sub-key map of a hash parent, as persisted
pub type HashFields = BTreeMap<String, Value>;

/// Everything a snapshot holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Unix ms when the snapshot was taken
    pub created_at: u64,

    /// Plain keys
    pub entries: BTreeMap<String, Entry<Value>>,

    /// Hash parents with their sub-keys
    pub hashes: BTreeMap<String, Entry<HashFields>>,
}

impl SnapshotData {
    /// Number of plain keys plus hash parents
    pub fn key_count(&self) -> usize {
        self.entries.len() + self.hashes.len()
    }

    /// Drop everything already expired at `now`
    pub fn retain_live(&mut self, now: u64) {
        self.entries.retain(|_, e| !e.is_expired_at(now));
        self.hashes.retain(|_, e| !e.is_expired_at(now));
    }
}
