// stageline-core/src/core/sanitize.rs
// ============================================================================
// Module: Stageline Identifier Sanitizer
// Description: Canonicalization of raw part names into storage-safe identifiers.
// Purpose: Provide a pure, total, idempotent mapping from arbitrary input to [a-z0-9_]+.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Raw part names arrive from external form submissions and are untrusted.
//! [`sanitize`] maps any input string to a canonical, storage-safe name made
//! of lowercase letters, digits, and underscores. The mapping is pure and
//! total: every input produces exactly one output and the function never
//! fails. Collision resolution across distinct raw names that sanitize to
//! the same canonical name is the registry's responsibility, not this
//! module's.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Reserved Keywords
// ============================================================================

/// Storage keywords that may not be used verbatim as identifiers.
///
/// # Invariants
/// - Entries are lowercase and sorted so membership checks can binary search.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "alter", "and", "as", "between", "by", "case", "check", "commit", "constraint",
    "create", "default", "delete", "distinct", "drop", "else", "end", "exists", "foreign", "from",
    "group", "having", "in", "index", "insert", "into", "is", "join", "key", "like", "limit",
    "not", "null", "offset", "on", "or", "order", "pragma", "primary", "references", "rollback",
    "select", "set", "table", "then", "transaction", "union", "unique", "update", "values",
    "when", "where",
];

/// Returns whether a canonical name equals a reserved storage keyword.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYWORDS.binary_search(&name).is_ok()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a raw name cannot yield a usable identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// The raw name sanitizes to an empty string.
    #[error("invalid identifier: {0:?} sanitizes to an empty name")]
    InvalidIdentifier(String),
}

// ============================================================================
// SECTION: Sanitizer
// ============================================================================

/// Canonicalizes a raw name into a storage-safe identifier.
///
/// Lower-cases the input, replaces each run of characters outside
/// `[a-z0-9_]` with a single underscore, strips leading and trailing
/// underscores, and prefixes `p_` when the result would start with a digit
/// or equal a reserved storage keyword.
///
/// # Invariants
/// - Total: never fails; symbol-only input yields an empty string.
/// - Idempotent: `sanitize(sanitize(x)) == sanitize(x)` for every `x`.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_gap = false;
    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.push(ch);
        } else {
            pending_gap = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    let trimmed = out.trim_start_matches('_');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with(|ch: char| ch.is_ascii_digit()) || is_reserved(trimmed) {
        return format!("p_{trimmed}");
    }
    trimmed.to_string()
}
