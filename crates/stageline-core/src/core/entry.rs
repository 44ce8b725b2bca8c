// stageline-core/src/core/entry.rs
// ============================================================================
// Module: Stageline Data Entries
// Description: Generic map-backed records conforming to a part's schema.
// Purpose: Represent stored entries without runtime type generation.
// Dependencies: crate::core::{identifiers, schema, time}, serde
// ============================================================================

//! ## Overview
//! A data entry is one stored record for a part: base identifier values,
//! stage flags, and custom checkbox values held in a name-to-value map.
//! Entries are generic over parts rather than using per-part native types,
//! so the same repository code serves every synthesized schema.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EntryId;
use crate::core::identifiers::FieldName;
use crate::core::schema::FieldKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Field Values
// ============================================================================

/// Value of a single entry field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag value.
    Boolean(bool),
    /// Free-form text value.
    Text(String),
}

impl FieldValue {
    /// Returns the schema field kind this value satisfies.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Boolean(_) => FieldKind::Boolean,
            Self::Text(_) => FieldKind::Text,
        }
    }

    /// Returns the default value for a synthesizable field kind, if any.
    ///
    /// Only `Text` and `Boolean` fields carry entry values; identifier and
    /// timestamp kinds are implicit columns managed by the backends.
    #[must_use]
    pub const fn default_for(kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::Text => Some(Self::Text(String::new())),
            FieldKind::Boolean => Some(Self::Boolean(false)),
            FieldKind::Identifier | FieldKind::Timestamp => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// ============================================================================
// SECTION: Data Entry
// ============================================================================

/// One stored record conforming to a part's schema definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Surrogate entry identifier assigned by the backing storage.
    pub entry_id: EntryId,
    /// Field values keyed by canonical field name.
    pub values: BTreeMap<FieldName, FieldValue>,
    /// Creation time assigned by the backend.
    pub created_at: Timestamp,
    /// Last-update time assigned by the backend.
    pub updated_at: Timestamp,
}

impl DataEntry {
    /// Returns the value for a field by exact name, if present.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(&FieldName::new(name))
    }
}
