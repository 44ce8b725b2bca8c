// stageline-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Part Store
// Description: Durable registry, provisioner, and entry repository on SQLite.
// Purpose: Persist schemas with verified hashes and reconcile per-part tables.
// Dependencies: stageline-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the Stageline backend interfaces on `SQLite`. The
//! schema registry stores canonical JSON schema payloads in a single table
//! and verifies stored hashes before deserialization, failing closed on
//! corruption. The provisioner maintains one physical table per part,
//! creating it on first registration and issuing additive `ALTER TABLE`
//! repairs when the registered schema grows. Database contents are treated
//! as untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use serde::Serialize;
use stageline_core::CanonicalName;
use stageline_core::DataEntry;
use stageline_core::EntryError;
use stageline_core::EntryId;
use stageline_core::EntryRepository;
use stageline_core::FieldKind;
use stageline_core::FieldName;
use stageline_core::FieldValue;
use stageline_core::ProvisionError;
use stageline_core::ProvisionReport;
use stageline_core::RegisterOutcome;
use stageline_core::RegistryEntry;
use stageline_core::RegistryError;
use stageline_core::RegistryPage;
use stageline_core::SchemaDefinition;
use stageline_core::SchemaRegistry;
use stageline_core::StorageProvisioner;
use stageline_core::Timestamp;
use stageline_core::hashing::DEFAULT_HASH_ALGORITHM;
use stageline_core::hashing::HashAlgorithm;
use stageline_core::hashing::canonical_json_bytes;
use stageline_core::hashing::hash_bytes;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a storage identifier (table or column name).
const MAX_IDENT_LENGTH: usize = 128;
/// Maximum serialized schema payload accepted by the registry.
pub const MAX_SCHEMA_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` part store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// Optional maximum schema payload size in bytes.
    #[serde(default)]
    pub registry_max_schema_bytes: Option<usize>,
    /// Optional maximum number of registered parts.
    #[serde(default)]
    pub registry_max_entries: Option<usize>,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given database path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
            registry_max_schema_bytes: None,
            registry_max_entries: None,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

/// Validates limits carried by the store configuration.
fn validate_config_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if let Some(max_bytes) = config.registry_max_schema_bytes
        && (max_bytes == 0 || max_bytes > MAX_SCHEMA_BYTES)
    {
        return Err(SqliteStoreError::Invalid(format!(
            "registry_max_schema_bytes out of range: {max_bytes} (max {MAX_SCHEMA_BYTES})"
        )));
    }
    if let Some(max_entries) = config.registry_max_entries
        && max_entries == 0
    {
        return Err(SqliteStoreError::Invalid(
            "registry_max_entries must be greater than zero".to_string(),
        ));
    }
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw schema or entry payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store payload exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for RegistryError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "schema_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a store error onto the provisioning taxonomy.
///
/// Busy and locked database errors are contention and safe to retry, so they
/// map to [`ProvisionError::Transient`]; everything else is structural.
fn provision_error(error: SqliteStoreError) -> ProvisionError {
    match error {
        SqliteStoreError::Db(message) if is_contention_message(&message) => {
            ProvisionError::Transient(message)
        }
        other => ProvisionError::Fatal(other.to_string()),
    }
}

/// Maps a store error onto the entry repository taxonomy.
fn entry_error(error: SqliteStoreError) -> EntryError {
    match error {
        SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => EntryError::Io(message),
        other => EntryError::Invalid(other.to_string()),
    }
}

/// Returns whether a database error message indicates lock contention.
fn is_contention_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("busy") || lower.contains("locked")
}

// ============================================================================
// SECTION: Perf Stats
// ============================================================================

/// Store-level operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOpCounts {
    /// Registry register-or-update operations.
    pub register: u64,
    /// Registry lookup operations.
    pub lookup: u64,
    /// Registry list operations.
    pub list: u64,
    /// Provisioner ensure operations.
    pub ensure: u64,
    /// Provisioner recreate operations.
    pub recreate: u64,
    /// Repository entry creations.
    pub create: u64,
    /// Repository entry updates.
    pub update: u64,
    /// Repository entry queries.
    pub query: u64,
}

/// Classified database error counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteDbErrorCounts {
    /// Count of `busy` database errors.
    pub busy: u64,
    /// Count of `locked` database errors.
    pub locked: u64,
    /// Count of all other database errors.
    pub other: u64,
}

/// Snapshot of lightweight operation and contention stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlitePerfStatsSnapshot {
    /// Per-class operation counts.
    pub op_counts: SqliteOpCounts,
    /// Database error counters.
    pub db_errors: SqliteDbErrorCounts,
}

/// Mutable perf counter state behind the stats mutex.
#[derive(Debug, Default)]
struct SqlitePerfStats {
    /// Per-class operation counts.
    op_counts: SqliteOpCounts,
    /// Database error counters.
    db_errors: SqliteDbErrorCounts,
}

/// Operation classes tracked by the perf counters.
#[derive(Debug, Clone, Copy)]
enum StoreOp {
    /// Registry register-or-update.
    Register,
    /// Registry lookup.
    Lookup,
    /// Registry list.
    List,
    /// Provisioner ensure.
    Ensure,
    /// Provisioner recreate.
    Recreate,
    /// Repository create.
    Create,
    /// Repository update.
    Update,
    /// Repository query.
    Query,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Cursor payload for registry pagination.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryCursor {
    /// Canonical name of the cursor anchor.
    canonical_name: String,
}

/// `SQLite`-backed part store implementing registry, provisioner, and
/// repository interfaces.
///
/// # Invariants
/// - Schema lookups verify stored hashes before deserialization.
/// - All mutation goes through the single writer connection; reads use the
///   round-robin read pool.
#[derive(Clone)]
pub struct SqlitePartStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
    /// Lightweight operation stats used for local diagnostics.
    perf_stats: Arc<Mutex<SqlitePerfStats>>,
}

impl SqlitePartStore {
    /// Opens an `SQLite`-backed part store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or when the configuration is invalid.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        validate_config_limits(&config)?;
        ensure_parent_dir(&config.path)?;
        let mut write_connection = open_connection(&config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            let mut read_connection = open_connection(&config)?;
            initialize_schema(&mut read_connection)?;
            read_connections.push(Mutex::new(read_connection));
        }
        Ok(Self {
            config,
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
            perf_stats: Arc::new(Mutex::new(SqlitePerfStats::default())),
        })
    }

    /// Returns the effective schema payload size limit.
    const fn registry_max_schema_bytes(&self) -> usize {
        match self.config.registry_max_schema_bytes {
            Some(limit) => limit,
            None => MAX_SCHEMA_BYTES,
        }
    }

    /// Returns a snapshot of operation and contention counters.
    #[must_use]
    pub fn perf_stats_snapshot(&self) -> SqlitePerfStatsSnapshot {
        let guard = self.perf_stats.lock().unwrap_or_else(PoisonError::into_inner);
        SqlitePerfStatsSnapshot {
            op_counts: guard.op_counts.clone(),
            db_errors: guard.db_errors.clone(),
        }
    }

    /// Resets operation and contention counters.
    pub fn reset_perf_stats(&self) {
        let mut guard = self.perf_stats.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = SqlitePerfStats::default();
    }

    /// Increments the counter for one operation class.
    fn record_op(&self, op: StoreOp) {
        let mut guard = self.perf_stats.lock().unwrap_or_else(PoisonError::into_inner);
        let counts = &mut guard.op_counts;
        let slot = match op {
            StoreOp::Register => &mut counts.register,
            StoreOp::Lookup => &mut counts.lookup,
            StoreOp::List => &mut counts.list,
            StoreOp::Ensure => &mut counts.ensure,
            StoreOp::Recreate => &mut counts.recreate,
            StoreOp::Create => &mut counts.create,
            StoreOp::Update => &mut counts.update,
            StoreOp::Query => &mut counts.query,
        };
        *slot = slot.saturating_add(1);
    }

    /// Wraps a database error, classifying it for the contention counters.
    fn db_err(&self, error: &rusqlite::Error) -> SqliteStoreError {
        let message = error.to_string();
        let mut guard = self.perf_stats.lock().unwrap_or_else(PoisonError::into_inner);
        let lower = message.to_ascii_lowercase();
        if lower.contains("busy") {
            guard.db_errors.busy = guard.db_errors.busy.saturating_add(1);
        } else if lower.contains("locked") {
            guard.db_errors.locked = guard.db_errors.locked.saturating_add(1);
        } else {
            guard.db_errors.other = guard.db_errors.other.saturating_add(1);
        }
        drop(guard);
        SqliteStoreError::Db(message)
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }
}

// ============================================================================
// SECTION: Schema Registry
// ============================================================================

impl SchemaRegistry for SqlitePartStore {
    fn register_or_update(
        &self,
        name: &CanonicalName,
        schema: SchemaDefinition,
    ) -> Result<RegisterOutcome, RegistryError> {
        self.record_op(StoreOp::Register);
        self.register_inner(name, &schema).map_err(RegistryError::from)
    }

    fn lookup(&self, name: &CanonicalName) -> Result<Option<RegistryEntry>, RegistryError> {
        self.record_op(StoreOp::Lookup);
        self.lookup_inner(name).map_err(RegistryError::from)
    }

    fn list(&self, cursor: Option<String>, limit: usize) -> Result<RegistryPage, RegistryError> {
        self.record_op(StoreOp::List);
        self.list_inner(cursor, limit).map_err(RegistryError::from)
    }
}

impl SqlitePartStore {
    /// Registers a schema or replaces a stale registration.
    fn register_inner(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
    ) -> Result<RegisterOutcome, SqliteStoreError> {
        let schema_json = canonical_json_bytes(schema)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if schema_json.len() > self.registry_max_schema_bytes() {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: self.registry_max_schema_bytes(),
                actual_bytes: schema_json.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &schema_json);
        let registered_at_json = serde_json::to_string(&Timestamp::UnixMillis(unix_millis()))
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;

        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| self.db_err(&err))?;
        let existing: Option<(String, Vec<u8>)> = tx
            .query_row(
                "SELECT schema_hash, schema_json FROM schema_registry WHERE canonical_name = ?1",
                params![name.as_str()],
                |row| {
                    let hash: String = row.get(0)?;
                    let payload: Vec<u8> = row.get(1)?;
                    Ok((hash, payload))
                },
            )
            .optional()
            .map_err(|err| self.db_err(&err))?;
        let outcome = match existing {
            None => {
                if let Some(max_entries) = self.config.registry_max_entries {
                    let count: i64 = tx
                        .query_row("SELECT COUNT(*) FROM schema_registry", params![], |row| {
                            row.get(0)
                        })
                        .map_err(|err| self.db_err(&err))?;
                    let limit = i64::try_from(max_entries).unwrap_or(i64::MAX);
                    if count >= limit {
                        return Err(SqliteStoreError::Invalid(
                            "schema registry max entries exceeded".to_string(),
                        ));
                    }
                }
                tx.execute(
                    "INSERT INTO schema_registry (canonical_name, schema_json, schema_hash, \
                     hash_algorithm, storage_name, registered_at_json) VALUES (?1, ?2, ?3, ?4, \
                     ?5, ?6)",
                    params![
                        name.as_str(),
                        schema_json,
                        digest.value,
                        digest.algorithm.label(),
                        name.storage_name(),
                        registered_at_json
                    ],
                )
                .map_err(|err| self.db_err(&err))?;
                RegisterOutcome {
                    created: true,
                    changed: false,
                    previous: None,
                }
            }
            Some((stored_hash, _)) if stored_hash == digest.value => RegisterOutcome {
                created: false,
                changed: false,
                previous: None,
            },
            Some((_, previous_json)) => {
                let previous: SchemaDefinition = serde_json::from_slice(&previous_json)
                    .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
                tx.execute(
                    "UPDATE schema_registry SET schema_json = ?2, schema_hash = ?3, \
                     hash_algorithm = ?4, registered_at_json = ?5 WHERE canonical_name = ?1",
                    params![
                        name.as_str(),
                        schema_json,
                        digest.value,
                        digest.algorithm.label(),
                        registered_at_json
                    ],
                )
                .map_err(|err| self.db_err(&err))?;
                RegisterOutcome {
                    created: false,
                    changed: true,
                    previous: Some(previous),
                }
            }
        };
        tx.commit().map_err(|err| self.db_err(&err))?;
        drop(guard);
        Ok(outcome)
    }

    /// Loads and verifies a registry entry.
    fn lookup_inner(
        &self,
        name: &CanonicalName,
    ) -> Result<Option<RegistryEntry>, SqliteStoreError> {
        let loaded = {
            let guard = self
                .read_connection()
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            let length: Option<i64> = guard
                .query_row(
                    "SELECT length(schema_json) FROM schema_registry WHERE canonical_name = ?1",
                    params![name.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| self.db_err(&err))?;
            let Some(length) = length else {
                drop(guard);
                return Ok(None);
            };
            let length = usize::try_from(length).map_err(|_| {
                SqliteStoreError::Corrupt(format!("negative schema length for part {name}"))
            })?;
            if length > self.registry_max_schema_bytes() {
                return Err(SqliteStoreError::TooLarge {
                    max_bytes: self.registry_max_schema_bytes(),
                    actual_bytes: length,
                });
            }
            let row: Option<(Vec<u8>, String, String, String, String)> = guard
                .query_row(
                    "SELECT schema_json, schema_hash, hash_algorithm, storage_name, \
                     registered_at_json FROM schema_registry WHERE canonical_name = ?1",
                    params![name.as_str()],
                    |row| {
                        let bytes: Vec<u8> = row.get(0)?;
                        let hash: String = row.get(1)?;
                        let algorithm: String = row.get(2)?;
                        let storage_name: String = row.get(3)?;
                        let registered_at_json: String = row.get(4)?;
                        Ok((bytes, hash, algorithm, storage_name, registered_at_json))
                    },
                )
                .optional()
                .map_err(|err| self.db_err(&err))?;
            drop(guard);
            row
        };
        let Some((bytes, hash_value, algorithm_label, storage_name, registered_at_json)) = loaded
        else {
            return Ok(None);
        };
        let algorithm = parse_hash_algorithm(&algorithm_label)?;
        let expected = hash_bytes(algorithm, &bytes);
        if expected.value != hash_value {
            return Err(SqliteStoreError::Corrupt(format!("hash mismatch for part {name}")));
        }
        let schema: SchemaDefinition = serde_json::from_slice(&bytes)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let registered_at: Timestamp = serde_json::from_str(&registered_at_json)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let content_hash = schema.content_hash.clone();
        Ok(Some(RegistryEntry {
            canonical_name: name.clone(),
            schema,
            storage_name,
            registered_at,
            content_hash,
        }))
    }

    /// Lists registry entries in canonical-name order with keyset pagination.
    fn list_inner(
        &self,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<RegistryPage, SqliteStoreError> {
        if limit == 0 {
            return Err(SqliteStoreError::Invalid(
                "registry list limit must be greater than zero".to_string(),
            ));
        }
        // Fetch one row beyond the page to learn whether more parts remain.
        let fetch_limit = i64::try_from(limit.saturating_add(1))
            .map_err(|_| SqliteStoreError::Invalid("registry list limit too large".to_string()))?;
        let anchor = match cursor {
            None => String::new(),
            Some(raw) => {
                let RegistryCursor {
                    canonical_name,
                } = serde_json::from_str(&raw)
                    .map_err(|_| SqliteStoreError::Invalid("invalid cursor".to_string()))?;
                canonical_name
            }
        };
        let mut names: Vec<String> = {
            let guard = self
                .read_connection()
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            let mut stmt = guard
                .prepare(
                    "SELECT canonical_name FROM schema_registry WHERE canonical_name > ?1 ORDER \
                     BY canonical_name LIMIT ?2",
                )
                .map_err(|err| self.db_err(&err))?;
            let rows = stmt
                .query_map(params![anchor, fetch_limit], |row| row.get::<_, String>(0))
                .map_err(|err| self.db_err(&err))?;
            let mut names = Vec::new();
            for row in rows {
                names.push(row.map_err(|err| self.db_err(&err))?);
            }
            drop(stmt);
            drop(guard);
            names
        };
        let has_more = names.len() > limit;
        names.truncate(limit);
        let mut items = Vec::with_capacity(names.len());
        for raw in &names {
            let name = CanonicalName::from_raw(raw).map_err(|_| {
                SqliteStoreError::Corrupt(format!("invalid canonical name in registry: {raw:?}"))
            })?;
            // A row deleted between the page query and the verified load is
            // skipped rather than failing the whole page.
            if let Some(entry) = self.lookup_inner(&name)? {
                items.push(entry);
            }
        }
        let next_token = if has_more {
            items
                .last()
                .map(|entry| {
                    serde_json::to_string(&RegistryCursor {
                        canonical_name: entry.canonical_name.to_string(),
                    })
                    .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
                })
                .transpose()?
        } else {
            None
        };
        Ok(RegistryPage {
            items,
            next_token,
        })
    }
}

// ============================================================================
// SECTION: Storage Provisioner
// ============================================================================

impl StorageProvisioner for SqlitePartStore {
    fn ensure_storage(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
    ) -> Result<ProvisionReport, ProvisionError> {
        self.record_op(StoreOp::Ensure);
        self.ensure_inner(name, schema).map_err(provision_error)
    }

    fn recreate(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
        force: bool,
    ) -> Result<ProvisionReport, ProvisionError> {
        self.record_op(StoreOp::Recreate);
        self.recreate_inner(name, schema, force)
    }
}

impl SqlitePartStore {
    /// Creates missing storage or applies additive column repairs.
    fn ensure_inner(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
    ) -> Result<ProvisionReport, SqliteStoreError> {
        let storage_name = name.storage_name();
        validate_sql_ident(&storage_name)?;
        for field in &schema.fields {
            validate_sql_ident(field.name.as_str())?;
        }
        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| self.db_err(&err))?;
        let exists = table_exists(&tx, &storage_name).map_err(|err| self.db_err(&err))?;
        let columns_added = if exists {
            let existing =
                physical_columns(&tx, &storage_name).map_err(|err| self.db_err(&err))?;
            let mut added = Vec::new();
            for field in &schema.fields {
                if existing.contains(&field.name.as_str().to_ascii_lowercase()) {
                    continue;
                }
                tx.execute_batch(&format!(
                    "ALTER TABLE \"{storage_name}\" ADD COLUMN \"{}\" {};",
                    field.name,
                    column_sql_type(field.kind)
                ))
                .map_err(|err| self.db_err(&err))?;
                added.push(field.name.as_str().to_string());
            }
            added
        } else {
            tx.execute_batch(&create_table_sql(&storage_name, schema))
                .map_err(|err| self.db_err(&err))?;
            schema.fields.iter().map(|field| field.name.as_str().to_string()).collect()
        };
        tx.commit().map_err(|err| self.db_err(&err))?;
        drop(guard);
        Ok(ProvisionReport {
            storage_name,
            columns_added,
            recreated: false,
        })
    }

    /// Drops and rebuilds storage unless stored rows would be lost.
    fn recreate_inner(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
        force: bool,
    ) -> Result<ProvisionReport, ProvisionError> {
        let storage_name = name.storage_name();
        validate_sql_ident(&storage_name).map_err(provision_error)?;
        for field in &schema.fields {
            validate_sql_ident(field.name.as_str()).map_err(provision_error)?;
        }
        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| ProvisionError::Fatal("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| provision_error(self.db_err(&err)))?;
        let exists =
            table_exists(&tx, &storage_name).map_err(|err| provision_error(self.db_err(&err)))?;
        if exists && !force {
            let rows: i64 = tx
                .query_row(
                    &format!("SELECT COUNT(*) FROM \"{storage_name}\""),
                    params![],
                    |row| row.get(0),
                )
                .map_err(|err| provision_error(self.db_err(&err)))?;
            if rows > 0 {
                return Err(ProvisionError::WouldLoseData {
                    storage_name,
                    rows: u64::try_from(rows).unwrap_or(u64::MAX),
                });
            }
        }
        tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{storage_name}\";"))
            .map_err(|err| provision_error(self.db_err(&err)))?;
        tx.execute_batch(&create_table_sql(&storage_name, schema))
            .map_err(|err| provision_error(self.db_err(&err)))?;
        tx.commit().map_err(|err| provision_error(self.db_err(&err)))?;
        drop(guard);
        Ok(ProvisionReport {
            storage_name,
            columns_added: schema
                .fields
                .iter()
                .map(|field| field.name.as_str().to_string())
                .collect(),
            recreated: true,
        })
    }
}

// ============================================================================
// SECTION: Entry Repository
// ============================================================================

impl EntryRepository for SqlitePartStore {
    fn create(
        &self,
        name: &CanonicalName,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError> {
        self.record_op(StoreOp::Create);
        let schema = self.require_provisioned(name)?;
        check_fields(name, &schema, &fields)?;
        self.create_inner(name, &schema, &fields).map_err(entry_error)
    }

    fn update(
        &self,
        name: &CanonicalName,
        entry_id: EntryId,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError> {
        self.record_op(StoreOp::Update);
        let schema = self.require_provisioned(name)?;
        check_fields(name, &schema, &fields)?;
        self.update_inner(name, &schema, entry_id, &fields)
    }

    fn query(
        &self,
        name: &CanonicalName,
        filter: BTreeMap<String, FieldValue>,
    ) -> Result<Vec<DataEntry>, EntryError> {
        self.record_op(StoreOp::Query);
        let schema = self.require_provisioned(name)?;
        check_fields(name, &schema, &filter)?;
        self.query_rows(name, &schema, &filter, None).map_err(entry_error)
    }
}

impl SqlitePartStore {
    /// Confirms a part is registered and its storage exists.
    fn require_provisioned(&self, part: &CanonicalName) -> Result<SchemaDefinition, EntryError> {
        let entry = self.lookup_inner(part).map_err(entry_error)?;
        let Some(entry) = entry else {
            return Err(EntryError::SchemaNotProvisioned(part.to_string()));
        };
        let exists = {
            let guard = self
                .read_connection()
                .lock()
                .map_err(|_| EntryError::Io("mutex poisoned".to_string()))?;
            let exists = table_exists(&guard, &entry.storage_name)
                .map_err(|err| entry_error(self.db_err(&err)))?;
            drop(guard);
            exists
        };
        if !exists {
            return Err(EntryError::SchemaNotProvisioned(part.to_string()));
        }
        Ok(entry.schema)
    }

    /// Inserts one entry row with defaults for omitted fields.
    fn create_inner(
        &self,
        part: &CanonicalName,
        schema: &SchemaDefinition,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, SqliteStoreError> {
        let storage_name = part.storage_name();
        validate_sql_ident(&storage_name)?;
        let now = unix_millis();
        let mut column_sql = Vec::with_capacity(schema.fields.len() + 2);
        let mut placeholders = Vec::with_capacity(schema.fields.len() + 2);
        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(schema.fields.len() + 2);
        let mut values: BTreeMap<FieldName, FieldValue> = BTreeMap::new();
        for field in &schema.fields {
            validate_sql_ident(field.name.as_str())?;
            let value = match fields.get(field.name.as_str()) {
                Some(value) => value.clone(),
                None => FieldValue::default_for(field.kind).ok_or_else(|| {
                    SqliteStoreError::Invalid(format!(
                        "column {} requires an explicit value",
                        field.name
                    ))
                })?,
            };
            column_sql.push(format!("\"{}\"", field.name));
            placeholders.push(format!("?{}", params.len() + 1));
            params.push(field_value_to_sql(&value));
            values.insert(FieldName::new(field.name.as_str()), value);
        }
        for implicit in ["createdAt", "updatedAt"] {
            column_sql.push(format!("\"{implicit}\""));
            placeholders.push(format!("?{}", params.len() + 1));
            params.push(rusqlite::types::Value::Integer(now));
        }
        let sql = format!(
            "INSERT INTO \"{storage_name}\" ({}) VALUES ({})",
            column_sql.join(", "),
            placeholders.join(", ")
        );
        let entry_id = {
            let guard = self
                .write_connection
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            guard
                .execute(&sql, params_from_iter(params.iter()))
                .map_err(|err| self.db_err(&err))?;
            let entry_id = guard.last_insert_rowid();
            drop(guard);
            entry_id
        };
        Ok(DataEntry {
            entry_id: EntryId::new(entry_id),
            values,
            created_at: Timestamp::UnixMillis(now),
            updated_at: Timestamp::UnixMillis(now),
        })
    }

    /// Applies a partial update to one entry row and reads it back.
    fn update_inner(
        &self,
        part: &CanonicalName,
        schema: &SchemaDefinition,
        entry_id: EntryId,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError> {
        let storage_name = part.storage_name();
        validate_sql_ident(&storage_name).map_err(entry_error)?;
        let now = unix_millis();
        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(fields.len() + 2);
        for (field, value) in fields {
            validate_sql_ident(field).map_err(entry_error)?;
            assignments.push(format!("\"{field}\" = ?{}", params.len() + 1));
            params.push(field_value_to_sql(value));
        }
        assignments.push(format!("\"updatedAt\" = ?{}", params.len() + 1));
        params.push(rusqlite::types::Value::Integer(now));
        params.push(rusqlite::types::Value::Integer(entry_id.get()));
        let sql = format!(
            "UPDATE \"{storage_name}\" SET {} WHERE \"id\" = ?{}",
            assignments.join(", "),
            params.len()
        );
        let updated = {
            let guard = self
                .write_connection
                .lock()
                .map_err(|_| EntryError::Io("mutex poisoned".to_string()))?;
            let updated = guard
                .execute(&sql, params_from_iter(params.iter()))
                .map_err(|err| entry_error(self.db_err(&err)))?;
            drop(guard);
            updated
        };
        if updated == 0 {
            return Err(EntryError::EntryNotFound(entry_id.get()));
        }
        let rows = self
            .query_rows(part, schema, &BTreeMap::new(), Some(entry_id))
            .map_err(entry_error)?;
        rows.into_iter().next().ok_or(EntryError::EntryNotFound(entry_id.get()))
    }

    /// Shared row-reading path for queries and update read-back.
    fn query_rows(
        &self,
        part: &CanonicalName,
        schema: &SchemaDefinition,
        filter: &BTreeMap<String, FieldValue>,
        entry_id: Option<EntryId>,
    ) -> Result<Vec<DataEntry>, SqliteStoreError> {
        let storage_name = part.storage_name();
        validate_sql_ident(&storage_name)?;
        let mut select_columns = vec!["\"id\"".to_string()];
        for field in &schema.fields {
            validate_sql_ident(field.name.as_str())?;
            select_columns.push(format!("\"{}\"", field.name));
        }
        select_columns.push("\"createdAt\"".to_string());
        select_columns.push("\"updatedAt\"".to_string());

        let mut predicates = Vec::new();
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        for (field, value) in filter {
            validate_sql_ident(field)?;
            predicates.push(format!("\"{field}\" = ?{}", params.len() + 1));
            params.push(field_value_to_sql(value));
        }
        if let Some(entry_id) = entry_id {
            predicates.push(format!("\"id\" = ?{}", params.len() + 1));
            params.push(rusqlite::types::Value::Integer(entry_id.get()));
        }
        let where_clause = if predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", predicates.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM \"{storage_name}\"{where_clause} ORDER BY \"id\" ASC",
            select_columns.join(", ")
        );

        let guard = self
            .read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let mut stmt = guard.prepare(&sql).map_err(|err| self.db_err(&err))?;
        let mapped = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let entry_id: i64 = row.get(0)?;
                let mut values: BTreeMap<FieldName, FieldValue> = BTreeMap::new();
                for (offset, field) in schema.fields.iter().enumerate() {
                    let index = offset + 1;
                    let value = match field.kind {
                        FieldKind::Boolean => {
                            let raw: i64 = row.get(index)?;
                            FieldValue::Boolean(raw != 0)
                        }
                        FieldKind::Text => {
                            let raw: String = row.get(index)?;
                            FieldValue::Text(raw)
                        }
                        // Implicit kinds never appear in synthesized schemas;
                        // stored as INTEGER, surfaced as text when present.
                        FieldKind::Identifier | FieldKind::Timestamp => {
                            let raw: i64 = row.get(index)?;
                            FieldValue::Text(raw.to_string())
                        }
                    };
                    values.insert(FieldName::new(field.name.as_str()), value);
                }
                let created_at: i64 = row.get(schema.fields.len() + 1)?;
                let updated_at: i64 = row.get(schema.fields.len() + 2)?;
                Ok(DataEntry {
                    entry_id: EntryId::new(entry_id),
                    values,
                    created_at: Timestamp::UnixMillis(created_at),
                    updated_at: Timestamp::UnixMillis(updated_at),
                })
            })
            .map_err(|err| self.db_err(&err))?;
        let mut entries = Vec::new();
        for row in mapped {
            entries.push(row.map_err(|err| self.db_err(&err))?);
        }
        drop(stmt);
        drop(guard);
        Ok(entries)
    }
}

/// Validates provided field names and kinds against a schema definition.
fn check_fields(
    part: &CanonicalName,
    schema: &SchemaDefinition,
    fields: &BTreeMap<String, FieldValue>,
) -> Result<(), EntryError> {
    for (field, value) in fields {
        let Some(descriptor) = schema.field(field) else {
            return Err(EntryError::UnknownField {
                part: part.to_string(),
                field: field.clone(),
            });
        };
        if value.kind() != descriptor.kind {
            return Err(EntryError::InvalidValue {
                field: field.clone(),
                expected: descriptor.kind,
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Validates store paths against length limits and directory collisions.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Validates a table or column identifier before it is quoted into SQL.
fn validate_sql_ident(name: &str) -> Result<(), SqliteStoreError> {
    if name.is_empty() || name.len() > MAX_IDENT_LENGTH {
        return Err(SqliteStoreError::Invalid(format!(
            "storage identifier length out of range: {name:?}"
        )));
    }
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(SqliteStoreError::Invalid("empty storage identifier".to_string()));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SqliteStoreError::Invalid(format!(
            "storage identifier must start with a letter: {name:?}"
        )));
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(SqliteStoreError::Invalid(format!(
            "storage identifier contains invalid characters: {name:?}"
        )));
    }
    Ok(())
}

/// Returns the SQL column definition for a field kind.
const fn column_sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Boolean => "INTEGER NOT NULL DEFAULT 0",
        FieldKind::Text => "TEXT NOT NULL DEFAULT ''",
        FieldKind::Identifier | FieldKind::Timestamp => "INTEGER NOT NULL DEFAULT 0",
    }
}

/// Builds the CREATE TABLE statement for a part's storage.
fn create_table_sql(storage_name: &str, schema: &SchemaDefinition) -> String {
    let mut columns = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for field in &schema.fields {
        columns.push(format!("\"{}\" {}", field.name, column_sql_type(field.kind)));
    }
    columns.push("\"createdAt\" INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("\"updatedAt\" INTEGER NOT NULL DEFAULT 0".to_string());
    format!("CREATE TABLE \"{storage_name}\" ({});", columns.join(", "))
}

/// Converts a field value into an `SQLite` parameter value.
fn field_value_to_sql(value: &FieldValue) -> rusqlite::types::Value {
    match value {
        FieldValue::Boolean(flag) => rusqlite::types::Value::Integer(i64::from(*flag)),
        FieldValue::Text(text) => rusqlite::types::Value::Text(text.clone()),
    }
}

/// Returns whether a table with the given name exists.
fn table_exists(connection: &Connection, storage_name: &str) -> Result<bool, rusqlite::Error> {
    let found: Option<i64> = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![storage_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Returns the lowercased physical column names of a table.
fn physical_columns(
    connection: &Connection,
    storage_name: &str,
) -> Result<BTreeSet<String>, rusqlite::Error> {
    let mut stmt = connection.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map(params![storage_name], |row| row.get::<_, String>(0))?;
    let mut names = BTreeSet::new();
    for row in rows {
        names.insert(row?.to_ascii_lowercase());
    }
    Ok(names)
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_registry (
                    canonical_name TEXT PRIMARY KEY,
                    schema_json BLOB NOT NULL,
                    schema_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    storage_name TEXT NOT NULL,
                    registered_at_json TEXT NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Parses a stored hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::from_label(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}
