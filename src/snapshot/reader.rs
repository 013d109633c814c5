//! Snapshot Reader
//!
//! Reads and validates a snapshot file. Nothing is returned unless the whole
//! file checks out, so callers can swap state in all-or-nothing.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Result, StoreError};

use super::{SnapshotData, HEADER_SIZE, MAGIC, VERSION};

/// Reads snapshot files
pub struct SnapshotReader;

impl SnapshotReader {
    /// Read and decode the snapshot at `path`
    pub fn read(path: &Path) -> Result<SnapshotData> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::SnapshotNotFound(path.to_path_buf()),
            _ => StoreError::persistence(path, e),
        })?;

        Self::decode(&bytes)
    }

    /// Validate the header and checksum, then decode the payload
    pub fn decode(bytes: &[u8]) -> Result<SnapshotData> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::Deserialization(format!(
                "snapshot truncated: {} bytes, header needs {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        if &bytes[0..4] != MAGIC {
            return Err(StoreError::Deserialization(format!(
                "invalid snapshot magic: expected SKVS, got {:?}",
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(StoreError::Deserialization(format!(
                "unsupported snapshot version: {}",
                version
            )));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[6..14]);
        let payload_len = u64::from_le_bytes(len_bytes);

        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&bytes[14..18]);
        let expected_crc = u32::from_le_bytes(crc_bytes);

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() as u64 != payload_len {
            return Err(StoreError::Deserialization(format!(
                "snapshot payload length mismatch: header says {}, file has {}",
                payload_len,
                payload.len()
            )));
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        let actual_crc = hasher.finalize();
        if actual_crc != expected_crc {
            return Err(StoreError::Deserialization(format!(
                "snapshot checksum mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }

        bincode::deserialize(payload).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}
