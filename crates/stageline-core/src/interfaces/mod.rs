// stageline-core/src/interfaces/mod.rs
// ============================================================================
// Module: Stageline Interfaces
// Description: Backend-agnostic interfaces for registry, provisioning, and entries.
// Purpose: Define the contract surfaces used by the stageline runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how stageline integrates with storage backends without
//! embedding backend-specific details. Implementations must be atomic per
//! canonical name and fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::entry::DataEntry;
use crate::core::entry::FieldValue;
use crate::core::identifiers::CanonicalName;
use crate::core::identifiers::EntryId;
use crate::core::schema::FieldKind;
use crate::core::schema::RegisterOutcome;
use crate::core::schema::RegistryEntry;
use crate::core::schema::RegistryPage;
use crate::core::schema::SchemaDefinition;

// ============================================================================
// SECTION: Schema Registry
// ============================================================================

/// Schema registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry I/O error.
    #[error("schema registry io error: {0}")]
    Io(String),
    /// Registry data is corrupted or fails integrity checks.
    #[error("schema registry corruption: {0}")]
    Corrupt(String),
    /// Registry data version is incompatible.
    #[error("schema registry version mismatch: {0}")]
    VersionMismatch(String),
    /// Registry input or stored data is invalid.
    #[error("schema registry invalid data: {0}")]
    Invalid(String),
    /// Concurrent registration conflict detected mid-operation.
    ///
    /// Resolved internally by per-name serialization; reaching a caller
    /// indicates a locking bug.
    #[error("schema registry conflict: {0}")]
    Conflict(String),
}

/// Authoritative record of which schema is currently live per part.
pub trait SchemaRegistry {
    /// Registers a schema or updates a stale registration.
    ///
    /// Creates the entry when absent (`created`); replaces it when the
    /// content hash differs (`changed`, with the previous definition
    /// returned); otherwise a no-op. The only write path into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when persistence fails or data is invalid.
    fn register_or_update(
        &self,
        name: &CanonicalName,
        schema: SchemaDefinition,
    ) -> Result<RegisterOutcome, RegistryError>;

    /// Looks up the registry entry for a canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when loading fails.
    fn lookup(&self, name: &CanonicalName) -> Result<Option<RegistryEntry>, RegistryError>;

    /// Lists registry entries in canonical-name order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for a zero limit, an invalid cursor, or
    /// when loading fails.
    fn list(&self, cursor: Option<String>, limit: usize) -> Result<RegistryPage, RegistryError>;
}

// ============================================================================
// SECTION: Storage Provisioner
// ============================================================================

/// Report of a provisioning operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Backing storage name that was reconciled.
    pub storage_name: String,
    /// Column names added during this call, in schema order.
    pub columns_added: Vec<String>,
    /// True when storage was dropped and rebuilt.
    pub recreated: bool,
}

/// Storage provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Transient backend failure; safe to retry with backoff.
    #[error("provisioning transient failure: {0}")]
    Transient(String),
    /// Structural backend failure; retrying cannot succeed.
    #[error("provisioning failure: {0}")]
    Fatal(String),
    /// Destructive recreation refused because stored rows would be lost.
    #[error("recreating {storage_name} would lose {rows} stored entries; pass force to proceed")]
    WouldLoseData {
        /// Backing storage name that holds data.
        storage_name: String,
        /// Number of rows that would be dropped.
        rows: u64,
    },
}

/// Reconciles physical backing storage with registered schemas.
pub trait StorageProvisioner {
    /// Ensures backing storage exists and is a superset of the schema.
    ///
    /// Creates missing storage with the schema fields plus implicit
    /// surrogate-key and timestamp columns; adds schema fields absent from
    /// existing storage; never drops physical columns. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the backend rejects the operation.
    fn ensure_storage(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
    ) -> Result<ProvisionReport, ProvisionError>;

    /// Drops and rebuilds backing storage for a part.
    ///
    /// The only destructive operation. Refuses with
    /// [`ProvisionError::WouldLoseData`] when rows exist and `force` is
    /// false.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when data would be lost without `force`
    /// or when the backend rejects the operation.
    fn recreate(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
        force: bool,
    ) -> Result<ProvisionReport, ProvisionError>;
}

// ============================================================================
// SECTION: Entry Repository
// ============================================================================

/// Entry repository errors.
#[derive(Debug, Error)]
pub enum EntryError {
    /// No registry entry or backing storage exists for the part.
    #[error("schema not provisioned for part {0}")]
    SchemaNotProvisioned(String),
    /// A field key is absent from the registered schema.
    #[error("unknown field {field:?} for part {part}")]
    UnknownField {
        /// Canonical part name.
        part: String,
        /// Offending field key as supplied by the caller.
        field: String,
    },
    /// A field value contradicts the registered field kind.
    #[error("invalid value for field {field:?}: expected {expected}")]
    InvalidValue {
        /// Offending field name.
        field: String,
        /// Expected field kind.
        expected: FieldKind,
    },
    /// No entry exists with the given identifier.
    #[error("entry {0} not found")]
    EntryNotFound(i64),
    /// Repository I/O error.
    #[error("entry repository io error: {0}")]
    Io(String),
    /// Repository input or stored data is invalid.
    #[error("entry repository invalid data: {0}")]
    Invalid(String),
}

/// Create/update/query surface over provisioned backing storage.
pub trait EntryRepository {
    /// Creates a data entry for a provisioned part.
    ///
    /// Omitted registered fields default (empty text, false boolean); the
    /// backend assigns the entry id and both timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::SchemaNotProvisioned`] when the part is not
    /// registered and provisioned, [`EntryError::UnknownField`] or
    /// [`EntryError::InvalidValue`] for bad field input, and
    /// [`EntryError::Io`] when persistence fails.
    fn create(
        &self,
        name: &CanonicalName,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError>;

    /// Updates fields of an existing entry and refreshes its update time.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::EntryNotFound`] for an unknown id, plus the
    /// same validation errors as [`EntryRepository::create`].
    fn update(
        &self,
        name: &CanonicalName,
        entry_id: EntryId,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError>;

    /// Queries entries matching equality filters over registered fields.
    ///
    /// Results are materialized in entry-id order so repeated identical
    /// queries are stable modulo concurrent writes; an empty filter returns
    /// every entry. The per-part lock is never held during iteration.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::SchemaNotProvisioned`] when the part is not
    /// provisioned and [`EntryError::UnknownField`] for filter keys absent
    /// from the registered schema.
    fn query(
        &self,
        name: &CanonicalName,
        filter: BTreeMap<String, FieldValue>,
    ) -> Result<Vec<DataEntry>, EntryError>;
}
