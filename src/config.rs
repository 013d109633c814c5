//! Configuration for stashkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Instance name; also the snapshot file stem
    pub name: String,

    // -------------------------------------------------------------------------
    // Snapshot Configuration
    // -------------------------------------------------------------------------
    /// Directory used by dump/load
    /// Internal structure:
    ///   {dump_dir}/
    ///     └── {name}.snap      (latest snapshot)
    pub dump_dir: PathBuf,

    /// fsync the snapshot file before renaming it into place
    pub sync_on_dump: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "stashkv".to_string(),
            dump_dir: PathBuf::from("."),
            sync_on_dump: true,
        }
    }
}

impl Config {
    /// Snapshot file extension
    pub const SNAPSHOT_EXTENSION: &'static str = "snap";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full path of the snapshot file: `{dump_dir}/{name}.snap`
    pub fn snapshot_path(&self) -> PathBuf {
        self.dump_dir
            .join(format!("{}.{}", self.name, Self::SNAPSHOT_EXTENSION))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the instance name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the snapshot directory
    pub fn dump_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dump_dir = path.into();
        self
    }

    /// Enable or disable fsync on dump
    pub fn sync_on_dump(mut self, sync: bool) -> Self {
        self.config.sync_on_dump = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
