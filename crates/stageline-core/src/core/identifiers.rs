// stageline-core/src/core/identifiers.rs
// ============================================================================
// Module: Stageline Identifiers
// Description: Canonical identifiers for parts, fields, and stored entries.
// Purpose: Provide strongly typed, serializable names with stable string forms.
// Dependencies: serde, crate::core::sanitize
// ============================================================================

//! ## Overview
//! This module defines the typed identifiers used throughout stageline. A
//! [`CanonicalName`] is only constructed through sanitization, so holding one
//! is proof the name is storage-safe. Field names and entry ids are opaque
//! wrappers validated at the boundaries that produce them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::sanitize::SanitizeError;
use crate::core::sanitize::sanitize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed prefix for backing storage names derived from canonical part names.
pub const STORAGE_NAME_PREFIX: &str = "entries_";

// ============================================================================
// SECTION: Canonical Part Name
// ============================================================================

/// Canonical, storage-safe part name produced by the sanitizer.
///
/// # Invariants
/// - Always non-empty and matches `[a-z0-9_]+` without leading/trailing
///   underscores; construction goes through [`CanonicalName::from_raw`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    /// Sanitizes a raw part name into a canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::InvalidIdentifier`] when the raw name
    /// sanitizes to an empty string.
    pub fn from_raw(raw: &str) -> Result<Self, SanitizeError> {
        let canonical = sanitize(raw);
        if canonical.is_empty() {
            return Err(SanitizeError::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(canonical))
    }

    /// Returns the canonical name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the deterministic backing storage name for this part.
    #[must_use]
    pub fn storage_name(&self) -> String {
        format!("{STORAGE_NAME_PREFIX}{}", self.0)
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Field Name
// ============================================================================

/// Name of a single field within a schema definition.
///
/// # Invariants
/// - Produced only from the fixed base/stage vocabulary or from sanitized
///   custom checkbox names; treated as opaque afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    /// Creates a new field name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the field name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FieldName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Entry Identifier
// ============================================================================

/// Surrogate identifier for a stored data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Creates a new entry identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for EntryId {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}
