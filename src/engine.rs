//! Engine Module
//!
//! The in-process store: plain keys, hash parents with sub-keys, counters,
//! and snapshot persistence.
//!
//! ## Responsibilities
//! - Keep key → entry and parent → sub-key maps behind one lock
//! - Resolve TTL expiry lazily when a key is touched
//! - Run counter read-modify-write atomically
//! - Dump/load the live state to `{dump_dir}/{name}.snap`
//!
//! ## Limitations
//! There is no background sweeper. An expired key that is never touched again
//! keeps its memory until a lookup, a `get_keys`/`hash_keys` scan,
//! `purge_expired`, `clear` or `load` removes it.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::command::{Command, Reply};
use crate::config::Config;
use crate::entry::{now_millis, Entry, KeyTtl, Ttl};
use crate::error::{Result, StoreError};
use crate::pattern::GlobPattern;
use crate::snapshot::{HashFields, SnapshotData, SnapshotReader, SnapshotWriter};
use crate::value::Value;

/// Sub-key map of one hash parent
pub type Fields = HashMap<String, Value>;

/// Both maps, guarded together so `clear` and `load` are atomic
#[derive(Default)]
struct Keyspace {
    /// Plain keys
    entries: HashMap<String, Entry<Value>>,

    /// Hash parents; expiry lives on the parent entry
    hashes: HashMap<String, Entry<Fields>>,
}

/// Return the live entry for `key`, removing it first if it has expired
fn resolve<'a, T>(
    map: &'a mut HashMap<String, Entry<T>>,
    key: &str,
    now: u64,
) -> Option<&'a mut Entry<T>> {
    if map.get(key)?.is_expired_at(now) {
        map.remove(key);
        tracing::debug!("Removed expired key '{}' on access", key);
        return None;
    }
    map.get_mut(key)
}

/// Drop every expired entry from `map`, returning how many went
fn purge<T>(map: &mut HashMap<String, Entry<T>>, now: u64) -> usize {
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired_at(now));
    before - map.len()
}

/// The key-value engine
///
/// ## Concurrency Model
///
/// One `parking_lot::RwLock` guards both maps.
///
/// - **Reads** (`get`, `hget`, `ttl`, ...): take the read lock. Only when the
///   entry turns out to be expired do they take the write lock, re-check, and
///   remove it.
/// - **Writes** (`set`, `hset`, `incr`, `delete`, `clear`, `load`): take the
///   write lock for the whole mutation. `incr` reads, adds and stores under a
///   single acquisition, so concurrent increments never lose updates.
/// - **Dump** copies the live state under the read lock and does the file
///   I/O after releasing it. A separate mutex lets only one dump at a time
///   touch the snapshot files.
///
/// Expiry is always judged against a clock read taken after the lock is
/// held, so an entry that expires while a caller waits is seen as gone.
///
/// Share an engine between threads with `Arc<Engine>`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// `{dump_dir}/{name}.snap`
    snapshot_path: PathBuf,

    /// Plain and hash maps
    keyspace: RwLock<Keyspace>,

    /// Held for the whole of a dump
    dump_lock: Mutex<()>,
}

impl Engine {
    /// Create an empty engine. Performs no I/O.
    pub fn new(config: Config) -> Self {
        let snapshot_path = config.snapshot_path();
        Self {
            config,
            snapshot_path,
            keyspace: RwLock::new(Keyspace::default()),
            dump_lock: Mutex::new(()),
        }
    }

    /// Open an engine, restoring its snapshot if one exists
    ///
    /// On startup:
    /// 1. Create the dump directory if it doesn't exist
    /// 2. Load `{dump_dir}/{name}.snap` when present
    /// 3. Start empty otherwise
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.dump_dir)
            .map_err(|e| StoreError::persistence(&config.dump_dir, e))?;

        let engine = Self::new(config);
        match engine.load() {
            Ok(()) => {}
            Err(StoreError::SnapshotNotFound(path)) => {
                tracing::debug!("No snapshot at {}, starting empty", path.display());
            }
            Err(e) => return Err(e),
        }

        Ok(engine)
    }

    /// Execute a command
    ///
    /// Routes commands to the matching operation
    pub fn execute(&self, command: Command) -> Result<Reply> {
        let reply = match command {
            Command::Get { key } => Reply::Value(self.get(&key)),
            Command::Set { key, value, ttl } => {
                self.set_with_ttl(key, value, ttl);
                Reply::Ok
            }
            Command::Delete { key } => Reply::Bool(self.delete(&key)),
            Command::Incr { key, amount } => Reply::Integer(self.incr_by(&key, amount)?),
            Command::HSet {
                parent,
                field,
                value,
                ttl,
            } => {
                self.hset_with_ttl(parent, field, value, ttl);
                Reply::Ok
            }
            Command::HGet { parent, field } => Reply::Value(self.hget(&parent, &field)),
            Command::HExpire { parent, ttl } => Reply::Bool(self.hset_expire(&parent, ttl)),
            Command::HDelete { parent, field } => Reply::Bool(self.hdelete(&parent, &field)),
            Command::HClear { parent } => Reply::Bool(self.hclear(&parent)),
            Command::Keys { pattern } => Reply::Keys(self.get_keys(&pattern)),
            Command::Ttl { key } => Reply::Ttl(self.ttl(&key)),
            Command::Clear => {
                self.clear();
                Reply::Ok
            }
            Command::Dump => {
                self.dump()?;
                Reply::Ok
            }
            Command::Load => {
                self.load()?;
                Reply::Ok
            }
        };
        Ok(reply)
    }

    // =========================================================================
    // Entry Store
    // =========================================================================

    /// Set a key without expiry, replacing any previous value
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.set_with_ttl(key, value, Ttl::Never);
    }

    /// Set a key with a TTL, replacing any previous value and expiry
    ///
    /// A zero or negative TTL stores an already-expired entry: the key reads
    /// as absent from this call on.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<Value>, ttl: Ttl) {
        let (key, value) = (key.into(), value.into());
        let mut ks = self.keyspace.write();
        ks.entries.insert(key, Entry::new(value, ttl, now_millis()));
    }

    /// Get the value for a key, or `None` if it is absent or expired
    pub fn get(&self, key: &str) -> Option<Value> {
        self.with_live_entry(key, |entry, _| entry.value.clone())
    }

    /// Check whether a key is present and not expired
    pub fn exists(&self, key: &str) -> bool {
        self.with_live_entry(key, |_, _| ()).is_some()
    }

    /// Remaining lifetime of a key, or `None` if it is absent or expired
    pub fn ttl(&self, key: &str) -> Option<KeyTtl> {
        self.with_live_entry(key, |entry, now| entry.ttl_at(now))
    }

    /// Delete a key
    ///
    /// Returns `true` if a live key was removed. Absent keys are not an error.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.keyspace.write().entries.remove(key);
        matches!(removed, Some(entry) if !entry.is_expired_at(now_millis()))
    }

    /// Delete several keys under one lock acquisition
    ///
    /// Returns the number of live keys removed.
    pub fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let mut ks = self.keyspace.write();
        let now = now_millis();
        keys.iter()
            .filter_map(|key| ks.entries.remove(key.as_ref()))
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    /// List live keys matching a glob pattern, sorted
    ///
    /// Expired keys met during the scan are removed.
    pub fn get_keys(&self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);

        let mut keys: Vec<String> = {
            let mut ks = self.keyspace.write();
            let now = now_millis();
            let expired = purge(&mut ks.entries, now);
            if expired > 0 {
                tracing::debug!("Removed {} expired keys during scan", expired);
            }
            ks.entries
                .keys()
                .filter(|key| pattern.matches(key))
                .cloned()
                .collect()
        };

        keys.sort_unstable();
        keys
    }

    /// Remove every plain key and every hash parent
    pub fn clear(&self) {
        let mut ks = self.keyspace.write();
        ks.entries.clear();
        ks.hashes.clear();
    }

    /// Remove all expired entries from both maps
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let mut ks = self.keyspace.write();
        let now = now_millis();
        let removed = purge(&mut ks.entries, now) + purge(&mut ks.hashes, now);
        if removed > 0 {
            tracing::debug!("Purged {} expired entries", removed);
        }
        removed
    }

    /// Number of live plain keys plus live hash parents
    pub fn len(&self) -> usize {
        let ks = self.keyspace.read();
        let now = now_millis();
        let live_entries = ks.entries.values().filter(|e| !e.is_expired_at(now)).count();
        let live_hashes = ks.hashes.values().filter(|e| !e.is_expired_at(now)).count();
        live_entries + live_hashes
    }

    /// Returns true if no live key or hash parent remains
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Hash Extension
    // =========================================================================

    /// Set a sub-key under a hash parent without expiry
    pub fn hset(
        &self,
        parent: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.hset_with_ttl(parent, field, value, Ttl::Never);
    }

    /// Set a sub-key under a hash parent
    ///
    /// `ttl` applies to the parent and only when this call creates it. On an
    /// existing live parent it is ignored and the parent keeps its expiry; use
    /// [`Engine::hset_expire`] to change it.
    pub fn hset_with_ttl(
        &self,
        parent: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
        ttl: Ttl,
    ) {
        let parent = parent.into();
        let mut ks = self.keyspace.write();
        let now = now_millis();

        // An expired parent is gone: this call creates a fresh one
        resolve(&mut ks.hashes, &parent, now);

        ks.hashes
            .entry(parent)
            .or_insert_with(|| Entry::new(Fields::new(), ttl, now))
            .value
            .insert(field.into(), value.into());
    }

    /// Replace the expiry of a hash parent
    ///
    /// `Ttl::Never` removes the expiry. Returns `false` if the parent does not
    /// exist or has expired.
    pub fn hset_expire(&self, parent: &str, ttl: Ttl) -> bool {
        let mut ks = self.keyspace.write();
        let now = now_millis();
        match resolve(&mut ks.hashes, parent, now) {
            Some(entry) => {
                entry.expires_at = ttl.deadline(now);
                tracing::debug!("Hash '{}' expiry set to {:?}", parent, entry.expires_at);
                true
            }
            None => false,
        }
    }

    /// Get a sub-key's value, or `None` if the parent or the sub-key is absent
    pub fn hget(&self, parent: &str, field: &str) -> Option<Value> {
        self.with_live_hash(parent, |entry, _| entry.value.get(field).cloned())
            .flatten()
    }

    /// Copy of all sub-keys of a live parent
    pub fn hget_all(&self, parent: &str) -> Option<Fields> {
        self.with_live_hash(parent, |entry, _| entry.value.clone())
    }

    /// Sorted sub-key names of a parent; empty if the parent is absent
    pub fn hkeys(&self, parent: &str) -> Vec<String> {
        let mut fields: Vec<String> = self
            .with_live_hash(parent, |entry, _| entry.value.keys().cloned().collect())
            .unwrap_or_else(Vec::new);
        fields.sort_unstable();
        fields
    }

    /// Number of sub-keys of a parent; 0 if the parent is absent
    pub fn hlen(&self, parent: &str) -> usize {
        self.with_live_hash(parent, |entry, _| entry.value.len())
            .unwrap_or(0)
    }

    /// Remaining lifetime of a hash parent
    pub fn hash_ttl(&self, parent: &str) -> Option<KeyTtl> {
        self.with_live_hash(parent, |entry, now| entry.ttl_at(now))
    }

    /// Remove one sub-key
    ///
    /// Returns `true` if it existed under a live parent. The parent stays,
    /// with its expiry, even when its last sub-key goes.
    pub fn hdelete(&self, parent: &str, field: &str) -> bool {
        let mut ks = self.keyspace.write();
        let now = now_millis();
        resolve(&mut ks.hashes, parent, now)
            .map(|entry| entry.value.remove(field).is_some())
            .unwrap_or(false)
    }

    /// Remove a parent together with all of its sub-keys
    ///
    /// Returns `true` if a live parent was removed.
    pub fn hclear(&self, parent: &str) -> bool {
        let removed = self.keyspace.write().hashes.remove(parent);
        matches!(removed, Some(entry) if !entry.is_expired_at(now_millis()))
    }

    /// List live hash parents matching a glob pattern, sorted
    pub fn hash_keys(&self, pattern: &str) -> Vec<String> {
        let pattern = GlobPattern::new(pattern);

        let mut parents: Vec<String> = {
            let mut ks = self.keyspace.write();
            let now = now_millis();
            purge(&mut ks.hashes, now);
            ks.hashes
                .keys()
                .filter(|parent| pattern.matches(parent))
                .cloned()
                .collect()
        };

        parents.sort_unstable();
        parents
    }

    // =========================================================================
    // Counter Operations
    // =========================================================================

    /// Increment an integer value by 1
    pub fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1)
    }

    /// Increment an integer value by `amount`
    ///
    /// An absent or expired key starts from 0 with no expiry. A live key keeps
    /// its expiry and its representation (`Int` stays `Int`, a numeric `Str`
    /// stays `Str`). Fails with `TypeMismatch` for non-integer values and with
    /// `Overflow` if the result does not fit in an `i64`.
    pub fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut ks = self.keyspace.write();
        let now = now_millis();

        let entry = match resolve(&mut ks.entries, key, now) {
            Some(entry) => entry,
            None => {
                ks.entries
                    .insert(key.to_string(), Entry::persistent(Value::Int(amount)));
                return Ok(amount);
            }
        };

        let current = entry
            .value
            .as_integer()
            .ok_or_else(|| StoreError::TypeMismatch {
                key: key.to_string(),
                found: entry.value.type_name(),
            })?;

        let next = current
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow {
                key: key.to_string(),
            })?;

        let as_text = matches!(entry.value, Value::Str(_));
        entry.value = if as_text {
            Value::Str(next.to_string())
        } else {
            Value::Int(next)
        };

        Ok(next)
    }

    /// Decrement an integer value by 1
    pub fn decr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, -1)
    }

    /// Decrement an integer value by `amount`
    pub fn decr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let delta = amount.checked_neg().ok_or_else(|| StoreError::Overflow {
            key: key.to_string(),
        })?;
        self.incr_by(key, delta)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Copy of the live state, as `dump` would write it
    ///
    /// Expired entries are left out; expiry instants are absolute Unix
    /// milliseconds. `SnapshotData` implements `Serialize`, so the copy can be
    /// exported with any serde format.
    pub fn export(&self) -> SnapshotData {
        let ks = self.keyspace.read();
        let now = now_millis();

        let entries = ks
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        let hashes = ks
            .hashes
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(parent, entry)| {
                let fields: HashFields = entry
                    .value
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect();
                (
                    parent.clone(),
                    Entry {
                        value: fields,
                        expires_at: entry.expires_at,
                    },
                )
            })
            .collect();

        SnapshotData {
            created_at: now,
            entries,
            hashes,
        }
    }

    /// Write the live state to the snapshot file
    ///
    /// Expired entries are skipped. The dump directory must already exist.
    /// Concurrent dumps run one after another, each writing a complete file.
    pub fn dump(&self) -> Result<()> {
        let _dumping = self.dump_lock.lock();
        let data = self.export();
        let writer = SnapshotWriter::new(&self.snapshot_path, self.config.sync_on_dump);
        let bytes = writer.write(&data)?;

        tracing::info!(
            "Dumped {} keys and {} hashes ({} bytes) to {}",
            data.entries.len(),
            data.hashes.len(),
            bytes,
            self.snapshot_path.display()
        );

        Ok(())
    }

    /// Replace the in-memory state with the snapshot file's contents
    ///
    /// The file is fully validated before anything is replaced; on any error
    /// the current state is left as it was. Entries that expired since the
    /// dump are discarded.
    pub fn load(&self) -> Result<()> {
        let mut data = SnapshotReader::read(&self.snapshot_path).map_err(|e| {
            if let StoreError::Deserialization(reason) = &e {
                tracing::warn!(
                    "Rejected snapshot {}: {}",
                    self.snapshot_path.display(),
                    reason
                );
            }
            e
        })?;

        let stored = data.key_count();
        data.retain_live(now_millis());

        let entries: HashMap<String, Entry<Value>> = data.entries.into_iter().collect();
        let hashes: HashMap<String, Entry<Fields>> = data
            .hashes
            .into_iter()
            .map(|(parent, entry)| {
                let fields: Fields = entry.value.into_iter().collect();
                (
                    parent,
                    Entry {
                        value: fields,
                        expires_at: entry.expires_at,
                    },
                )
            })
            .collect();

        let (key_count, hash_count) = (entries.len(), hashes.len());
        *self.keyspace.write() = Keyspace { entries, hashes };

        tracing::info!(
            "Loaded {} keys and {} hashes from {} ({} expired since dump)",
            key_count,
            hash_count,
            self.snapshot_path.display(),
            stored - key_count - hash_count
        );

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the engine name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the snapshot file path
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run `f` on the live entry for `key`
    ///
    /// Fast path under the read lock. An expired entry is removed under the
    /// write lock after re-checking, since a writer may have replaced it in
    /// between.
    fn with_live_entry<R>(&self, key: &str, f: impl Fn(&Entry<Value>, u64) -> R) -> Option<R> {
        {
            let ks = self.keyspace.read();
            let now = now_millis();
            match ks.entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(f(entry, now)),
                Some(_) => {}
            }
        }

        let mut ks = self.keyspace.write();
        let now = now_millis();
        resolve(&mut ks.entries, key, now).map(|entry| f(&*entry, now))
    }

    /// Same as `with_live_entry`, for hash parents
    fn with_live_hash<R>(&self, parent: &str, f: impl Fn(&Entry<Fields>, u64) -> R) -> Option<R> {
        {
            let ks = self.keyspace.read();
            let now = now_millis();
            match ks.hashes.get(parent) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(f(entry, now)),
                Some(_) => {}
            }
        }

        let mut ks = self.keyspace.write();
        let now = now_millis();
        resolve(&mut ks.hashes, parent, now).map(|entry| f(&*entry, now))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {}, Store Keys Amount: {}", self.name(), self.len())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alternate = f.alternate();
        let mut out = f.debug_struct("Engine");
        out.field("name", &self.config.name)
            .field("snapshot_path", &self.snapshot_path)
            .field("keys", &self.len());

        // `{:#?}` also prints the live contents
        if alternate {
            let data = self.export();
            out.field("entries", &data.entries).field("hashes", &data.hashes);
        }

        out.finish()
    }
}
