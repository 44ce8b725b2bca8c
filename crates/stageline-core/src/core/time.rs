// stageline-core/src/core/time.rs
// ============================================================================
// Module: Stageline Time Model
// Description: Canonical timestamp representation for registrations and entries.
// Purpose: Provide deterministic time values across stageline records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Registration and entry records embed explicit time values so that
//! behavior stays deterministic under test. The core crate never reads
//! wall-clock time directly; storage backends supply timestamps (the SQLite
//! backend reads the system clock, the in-memory backend uses a logical
//! counter).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in registry entries and data entries.
///
/// # Invariants
/// - Values are explicitly provided by backends; the core never reads
///   wall-clock time.
/// - No validation is performed; monotonicity is a backend responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnixMillis(value) => write!(f, "{value}"),
            Self::Logical(value) => write!(f, "logical:{value}"),
        }
    }
}
