// stageline-core/src/core/schema.rs
// ============================================================================
// Module: Stageline Schema Synthesis
// Description: Deterministic schema definitions synthesized from procedure configs.
// Purpose: Derive per-part field lists with content hashes for change detection.
// Dependencies: crate::core::{hashing, identifiers, procedure, sanitize, time}, serde
// ============================================================================

//! ## Overview
//! Schema synthesis turns a procedure configuration into the canonical field
//! list for a part's data entries. Synthesis is a pure function: the same
//! configuration always yields a byte-identical definition and content hash,
//! regardless of stage key order in the input. Enabled stages contribute one
//! boolean flag field plus one boolean field per custom checkbox; colliding
//! names are skipped, never overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::CanonicalName;
use crate::core::identifiers::FieldName;
use crate::core::procedure::ProcedureConfiguration;
use crate::core::procedure::STAGE_ORDER;
use crate::core::sanitize::sanitize;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Base Vocabulary
// ============================================================================

/// Base identifier field present in every schema: unit serial identifier.
pub const BASE_FIELD_USID: &str = "usid";
/// Base identifier field present in every schema: tag number.
pub const BASE_FIELD_TAG_NO: &str = "tagNo";
/// Implicit surrogate-key column added by the provisioner, never by synthesis.
pub const IMPLICIT_COLUMN_ID: &str = "id";
/// Implicit creation-timestamp column added by the provisioner.
pub const IMPLICIT_COLUMN_CREATED_AT: &str = "createdAt";
/// Implicit update-timestamp column added by the provisioner.
pub const IMPLICIT_COLUMN_UPDATED_AT: &str = "updatedAt";

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Kind of a single schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Surrogate-key identifier (implicit `id` column only).
    Identifier,
    /// Free-form text value.
    Text,
    /// Boolean flag value.
    Boolean,
    /// Timestamp value (implicit `createdAt`/`updatedAt` columns only).
    Timestamp,
}

impl FieldKind {
    /// Returns the stable label for the field kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One field of a synthesized schema definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Canonical field name.
    pub name: FieldName,
    /// Field kind.
    pub kind: FieldKind,
}

// ============================================================================
// SECTION: Schema Definition
// ============================================================================

/// Canonical, synthesized shape for a part's data entries.
///
/// # Invariants
/// - Field order is deterministic: base fields first, then stage fields in
///   the fixed stage order.
/// - Field names are unique case-insensitively (storage column names are
///   case-insensitive).
/// - `content_hash` is the canonical-JSON hash of `fields`; two definitions
///   are equal iff their hashes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Ordered field descriptors.
    pub fields: Vec<FieldDescriptor>,
    /// Content hash over the ordered field list.
    pub content_hash: HashDigest,
}

impl SchemaDefinition {
    /// Builds a definition from an ordered field list, computing the hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when hashing fails.
    pub fn from_fields(fields: Vec<FieldDescriptor>) -> Result<Self, HashError> {
        let content_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &fields)?;
        Ok(Self {
            fields,
            content_hash,
        })
    }

    /// Looks up a field descriptor by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.name.as_str() == name)
    }

    /// Returns whether the definition contains a field with the exact name.
    #[must_use]
    pub fn contains_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns field names present here but absent from `previous`.
    ///
    /// Comparison is case-insensitive to mirror storage column semantics.
    #[must_use]
    pub fn fields_added_since(&self, previous: &Self) -> Vec<FieldName> {
        let existing: BTreeSet<String> = previous
            .fields
            .iter()
            .map(|descriptor| descriptor.name.as_str().to_ascii_lowercase())
            .collect();
        self.fields
            .iter()
            .filter(|descriptor| {
                !existing.contains(&descriptor.name.as_str().to_ascii_lowercase())
            })
            .map(|descriptor| descriptor.name.clone())
            .collect()
    }
}

// ============================================================================
// SECTION: Registry Records
// ============================================================================

/// Registry record binding a canonical part name to its live schema.
///
/// # Invariants
/// - Mutated only through the registry's register-or-update operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Canonical part name.
    pub canonical_name: CanonicalName,
    /// Schema definition currently believed live.
    pub schema: SchemaDefinition,
    /// Deterministic backing storage name.
    pub storage_name: String,
    /// Registration or last-update time.
    pub registered_at: Timestamp,
    /// Copy of the schema content hash for cheap comparison.
    pub content_hash: HashDigest,
}

/// Result of a register-or-update operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOutcome {
    /// True when no entry existed and one was created.
    pub created: bool,
    /// True when an existing entry was replaced with a different schema.
    pub changed: bool,
    /// Previous schema definition when `changed` is true.
    pub previous: Option<SchemaDefinition>,
}

/// One page of registry entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPage {
    /// Entries in canonical-name order.
    pub items: Vec<RegistryEntry>,
    /// Opaque continuation token when more entries exist.
    pub next_token: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised during schema synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Content hashing of the synthesized field list failed.
    #[error("schema hashing failed: {0}")]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Synthesizer
// ============================================================================

/// Collision-checked field accumulator for synthesis.
struct FieldAccumulator {
    /// Fields in deterministic order.
    fields: Vec<FieldDescriptor>,
    /// Lowercased names already taken.
    seen: BTreeSet<String>,
}

impl FieldAccumulator {
    /// Creates an empty accumulator.
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Adds a field unless its name collides case-insensitively.
    fn push(&mut self, name: &str, kind: FieldKind) {
        let key = name.to_ascii_lowercase();
        if self.seen.contains(&key) {
            return;
        }
        self.seen.insert(key);
        self.fields.push(FieldDescriptor {
            name: FieldName::new(name),
            kind,
        });
    }
}

/// Synthesizes the canonical schema definition for a procedure configuration.
///
/// Base fields come first, then for each enabled stage in [`STAGE_ORDER`] a
/// boolean stage flag followed by one boolean field per custom checkbox.
/// Checkbox names are sanitized; names that sanitize to empty or collide
/// with an already-added field are skipped. Disabled stages and stage keys
/// outside the fixed vocabulary contribute nothing.
///
/// # Errors
///
/// Returns [`SynthesisError::Hash`] when content hashing fails.
pub fn synthesize(config: &ProcedureConfiguration) -> Result<SchemaDefinition, SynthesisError> {
    let mut accumulator = FieldAccumulator::new();
    accumulator.push(BASE_FIELD_USID, FieldKind::Text);
    accumulator.push(BASE_FIELD_TAG_NO, FieldKind::Text);
    for stage in STAGE_ORDER {
        let Some(spec) = config.stage(stage) else {
            continue;
        };
        if !spec.enabled {
            continue;
        }
        accumulator.push(stage, FieldKind::Boolean);
        for checkbox in &spec.custom_checkboxes {
            let canonical = sanitize(&checkbox.name);
            if canonical.is_empty() {
                continue;
            }
            accumulator.push(&canonical, FieldKind::Boolean);
        }
    }
    Ok(SchemaDefinition::from_fields(accumulator.fields)?)
}
