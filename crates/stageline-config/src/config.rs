// stageline-config/src/config.rs
// ============================================================================
// Module: Stageline Configuration
// Description: Configuration loading and validation for Stageline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: stageline-core, stageline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the process refuses to
//! start on any value outside its documented range.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use stageline_core::DEFAULT_MAX_CUSTOM_CHECKBOXES;
use stageline_core::DEFAULT_MAX_FIELD_NAME_LENGTH;
use stageline_core::DEFAULT_MAX_PROCEDURE_BYTES;
use stageline_core::ProcedureLimits;
use stageline_core::RetryPolicy;
use stageline_store_sqlite::MAX_SCHEMA_BYTES;
use stageline_store_sqlite::SqliteStoreConfig;
use stageline_store_sqlite::SqliteStoreMode;
use stageline_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stageline.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "STAGELINE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum allowed read pool size for the sqlite backend.
pub(crate) const MAX_READ_POOL_SIZE: usize = 64;
/// Maximum allowed sync retry attempts.
pub(crate) const MAX_SYNC_ATTEMPTS: u32 = 10;
/// Maximum allowed sync backoff delay in milliseconds.
pub(crate) const MAX_SYNC_DELAY_MS: u64 = 60_000;
/// Maximum allowed procedure payload limit in bytes.
pub(crate) const MAX_PROCEDURE_BYTES_LIMIT: usize = 1024 * 1024;
/// Maximum allowed custom checkbox count limit.
pub(crate) const MAX_CUSTOM_CHECKBOXES_LIMIT: usize = 256;
/// Maximum allowed field name length limit.
pub(crate) const MAX_FIELD_NAME_LENGTH_LIMIT: usize = 255;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Stageline configuration loaded from `stageline.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagelineConfig {
    /// Part store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Bulk re-sync retry configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Procedure payload limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl StagelineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, the `STAGELINE_CONFIG` environment
    /// variable, then `stageline.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.sync.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

/// Part store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Use the in-memory registry and storage engine.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable part store.
    Sqlite,
}

/// Part store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreBackend,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Read connection pool size for the sqlite backend.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// Maximum schema payload size accepted by the registry in bytes.
    #[serde(default = "default_max_schema_bytes")]
    pub max_schema_bytes: usize,
    /// Optional maximum number of registered parts.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreBackend::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
            max_schema_bytes: default_max_schema_bytes(),
            max_entries: None,
        }
    }
}

impl StoreConfig {
    /// Validates part store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_schema_bytes == 0 || self.max_schema_bytes > MAX_SCHEMA_BYTES {
            return Err(ConfigError::Invalid("store max_schema_bytes out of range".to_string()));
        }
        if self.max_entries == Some(0) {
            return Err(ConfigError::Invalid(
                "store max_entries must be greater than zero".to_string(),
            ));
        }
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(ConfigError::Invalid("store read_pool_size out of range".to_string()));
        }
        match self.store_type {
            StoreBackend::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreBackend::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path(path)
            }
        }
    }

    /// Builds the sqlite store configuration for the sqlite backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the backend is not sqlite or the path
    /// is missing.
    pub fn sqlite_config(&self) -> Result<SqliteStoreConfig, ConfigError> {
        if self.store_type != StoreBackend::Sqlite {
            return Err(ConfigError::Invalid(
                "store backend is not sqlite".to_string(),
            ));
        }
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
        Ok(SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            read_pool_size: self.read_pool_size,
            registry_max_schema_bytes: Some(self.max_schema_bytes),
            registry_max_entries: self.max_entries,
        })
    }
}

/// Bulk re-sync retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Total provisioning attempts including the first.
    #[serde(default = "default_sync_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_sync_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single retry delay in milliseconds.
    #[serde(default = "default_sync_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_sync_max_attempts(),
            base_delay_ms: default_sync_base_delay_ms(),
            max_delay_ms: default_sync_max_delay_ms(),
        }
    }
}

impl SyncConfig {
    /// Validates sync retry configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_SYNC_ATTEMPTS {
            return Err(ConfigError::Invalid("sync max_attempts out of range".to_string()));
        }
        if self.max_delay_ms == 0 || self.max_delay_ms > MAX_SYNC_DELAY_MS {
            return Err(ConfigError::Invalid("sync max_delay_ms out of range".to_string()));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid(
                "sync base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the retry policy described by this configuration.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}

/// Procedure payload limit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum procedure payload size in bytes.
    #[serde(default = "default_max_procedure_bytes")]
    pub max_procedure_bytes: usize,
    /// Maximum custom checkboxes per stage.
    #[serde(default = "default_max_custom_checkboxes")]
    pub max_custom_checkboxes: usize,
    /// Maximum checkbox name length in characters.
    #[serde(default = "default_max_field_name_length")]
    pub max_field_name_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_procedure_bytes: default_max_procedure_bytes(),
            max_custom_checkboxes: default_max_custom_checkboxes(),
            max_field_name_length: default_max_field_name_length(),
        }
    }
}

impl LimitsConfig {
    /// Validates procedure limit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_procedure_bytes == 0 || self.max_procedure_bytes > MAX_PROCEDURE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(
                "limits max_procedure_bytes out of range".to_string(),
            ));
        }
        if self.max_custom_checkboxes == 0
            || self.max_custom_checkboxes > MAX_CUSTOM_CHECKBOXES_LIMIT
        {
            return Err(ConfigError::Invalid(
                "limits max_custom_checkboxes out of range".to_string(),
            ));
        }
        if self.max_field_name_length == 0
            || self.max_field_name_length > MAX_FIELD_NAME_LENGTH_LIMIT
        {
            return Err(ConfigError::Invalid(
                "limits max_field_name_length out of range".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the procedure parse limits described by this configuration.
    #[must_use]
    pub const fn procedure_limits(&self) -> ProcedureLimits {
        ProcedureLimits {
            max_bytes: self.max_procedure_bytes,
            max_custom_checkboxes: self.max_custom_checkboxes,
            max_field_name_length: self.max_field_name_length,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a store database path against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("store path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default busy timeout for the sqlite backend in milliseconds.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Default read pool size for the sqlite backend.
const fn default_read_pool_size() -> usize {
    4
}

/// Default maximum schema payload size accepted by the registry.
const fn default_max_schema_bytes() -> usize {
    256 * 1024
}

/// Default total sync attempts including the first.
const fn default_sync_max_attempts() -> u32 {
    3
}

/// Default delay before the first sync retry in milliseconds.
const fn default_sync_base_delay_ms() -> u64 {
    50
}

/// Default upper bound on a single sync retry delay in milliseconds.
const fn default_sync_max_delay_ms() -> u64 {
    1_000
}

/// Default maximum procedure payload size in bytes.
const fn default_max_procedure_bytes() -> usize {
    DEFAULT_MAX_PROCEDURE_BYTES
}

/// Default maximum custom checkboxes per stage.
const fn default_max_custom_checkboxes() -> usize {
    DEFAULT_MAX_CUSTOM_CHECKBOXES
}

/// Default maximum checkbox name length in characters.
const fn default_max_field_name_length() -> usize {
    DEFAULT_MAX_FIELD_NAME_LENGTH
}

// ============================================================================
// SECTION: Tests
// ============================================================================
