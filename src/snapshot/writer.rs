//! Snapshot Writer
//!
//! Encodes a `SnapshotData` and installs it atomically: the bytes go to a
//! temporary sibling file which is then renamed over the target.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

use super::{SnapshotData, HEADER_SIZE, MAGIC, VERSION};

/// Writes snapshot files
pub struct SnapshotWriter {
    /// Final snapshot path
    path: PathBuf,
    /// fsync before rename
    sync: bool,
}

impl SnapshotWriter {
    /// Create a writer targeting `path`
    pub fn new(path: &Path, sync: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            sync,
        }
    }

    /// Encode snapshot data into the on-disk byte layout
    pub fn encode(data: &SnapshotData) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(data).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&payload);

        Ok(bytes)
    }

    /// Write the snapshot, replacing any previous file.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, data: &SnapshotData) -> Result<u64> {
        let bytes = Self::encode(data)?;
        let tmp_path = self.tmp_path();

        if let Err(e) = self.write_tmp(&tmp_path, &bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::persistence(&self.path, e)
        })?;

        Ok(bytes.len() as u64)
    }

    /// Get the target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_tmp(&self, tmp_path: &Path, bytes: &[u8]) -> Result<()> {
        let io_err = |e: std::io::Error| StoreError::persistence(tmp_path, e);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)
            .map_err(io_err)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(io_err)?;

        let file: File = writer
            .into_inner()
            .map_err(|e| StoreError::persistence(tmp_path, e.into_error()))?;

        if self.sync {
            file.sync_all().map_err(io_err)?;
        }

        Ok(())
    }

    /// "sessions.snap" → "sessions.snap.tmp"
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
