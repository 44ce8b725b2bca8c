// stageline-core/src/core/mod.rs
// ============================================================================
// Module: Stageline Core Types
// Description: Canonical stageline schema and record structures.
// Purpose: Provide stable, serializable types for schema synthesis and entries.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define the sanitizer, procedure configuration model, schema
//! synthesis, registry records, and data entries. These types are the
//! canonical source of truth for any derived surfaces (storage backends or
//! the CLI).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod entry;
pub mod hashing;
pub mod identifiers;
pub mod procedure;
pub mod sanitize;
pub mod schema;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use entry::DataEntry;
pub use entry::FieldValue;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::CanonicalName;
pub use identifiers::EntryId;
pub use identifiers::FieldName;
pub use identifiers::STORAGE_NAME_PREFIX;
pub use procedure::CustomCheckbox;
pub use procedure::DEFAULT_MAX_CUSTOM_CHECKBOXES;
pub use procedure::DEFAULT_MAX_FIELD_NAME_LENGTH;
pub use procedure::DEFAULT_MAX_PROCEDURE_BYTES;
pub use procedure::ProcedureConfiguration;
pub use procedure::ProcedureError;
pub use procedure::ProcedureLimits;
pub use procedure::STAGE_ORDER;
pub use procedure::StageSpec;
pub use procedure::is_known_stage;
pub use sanitize::SanitizeError;
pub use sanitize::is_reserved;
pub use sanitize::sanitize;
pub use schema::BASE_FIELD_TAG_NO;
pub use schema::BASE_FIELD_USID;
pub use schema::FieldDescriptor;
pub use schema::FieldKind;
pub use schema::IMPLICIT_COLUMN_CREATED_AT;
pub use schema::IMPLICIT_COLUMN_ID;
pub use schema::IMPLICIT_COLUMN_UPDATED_AT;
pub use schema::RegisterOutcome;
pub use schema::RegistryEntry;
pub use schema::RegistryPage;
pub use schema::SchemaDefinition;
pub use schema::SynthesisError;
pub use schema::synthesize;
pub use time::Timestamp;
