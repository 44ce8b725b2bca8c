// stageline-core/tests/sanitize.rs
// ============================================================================
// Module: Identifier Sanitizer Tests
// Description: Tests for canonical name derivation from raw part identifiers.
// Purpose: Ensure sanitization is total, idempotent, and storage-safe.
// Dependencies: stageline-core, proptest
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

use proptest::prelude::*;
use stageline_core::CanonicalName;
use stageline_core::is_reserved;
use stageline_core::sanitize;

#[test]
fn sanitize_lowercases_and_joins_words() {
    assert_eq!(sanitize("PCB Assembly Rev2"), "pcb_assembly_rev2");
}

#[test]
fn sanitize_collapses_invalid_runs_to_single_underscore() {
    assert_eq!(sanitize("a--!!--b"), "a_b");
    assert_eq!(sanitize("EICS112/Part"), "eics112_part");
}

#[test]
fn sanitize_strips_leading_and_trailing_underscores() {
    assert_eq!(sanitize("  padded  "), "padded");
    assert_eq!(sanitize("__core__"), "core");
    assert_eq!(sanitize("!!trim!!"), "trim");
}

#[test]
fn sanitize_preserves_literal_underscores() {
    assert_eq!(sanitize("already_canonical"), "already_canonical");
    assert_eq!(sanitize("a__b"), "a__b");
}

#[test]
fn sanitize_prefixes_digit_leading_names() {
    assert_eq!(sanitize("2nd Check"), "p_2nd_check");
    assert_eq!(sanitize("__3rd"), "p_3rd");
}

#[test]
fn sanitize_prefixes_reserved_keywords() {
    assert_eq!(sanitize("select"), "p_select");
    assert_eq!(sanitize("Order"), "p_order");
    assert_eq!(sanitize("TABLE"), "p_table");
}

#[test]
fn sanitize_leaves_prefixed_names_alone() {
    assert_eq!(sanitize("p_select"), "p_select");
    assert_eq!(sanitize("p_2nd_check"), "p_2nd_check");
}

#[test]
fn sanitize_maps_non_ascii_to_gaps() {
    assert_eq!(sanitize("Köln Board"), "k_ln_board");
    assert_eq!(sanitize("élite"), "lite");
}

#[test]
fn sanitize_returns_empty_for_symbol_only_input() {
    assert_eq!(sanitize(""), "");
    assert_eq!(sanitize("!!!"), "");
    assert_eq!(sanitize("___"), "");
    assert_eq!(sanitize("日本語"), "");
}

#[test]
fn reserved_lookup_matches_canonical_forms_only() {
    assert!(is_reserved("select"));
    assert!(is_reserved("where"));
    assert!(!is_reserved("p_select"));
    assert!(!is_reserved("usid"));
}

#[test]
fn canonical_name_rejects_empty_result() {
    let err = CanonicalName::from_raw("!!!").unwrap_err();
    assert!(err.to_string().contains("invalid identifier"));
}

#[test]
fn canonical_name_accepts_and_normalizes() {
    let name = CanonicalName::from_raw("EICS112_Part").unwrap();
    assert_eq!(name.as_str(), "eics112_part");
    assert_eq!(name.storage_name(), "entries_eics112_part");
}

#[test]
fn canonical_name_collides_for_case_variants() {
    let upper = CanonicalName::from_raw("QC").unwrap();
    let lower = CanonicalName::from_raw("qc").unwrap();
    assert_eq!(upper, lower);
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(raw in ".*") {
        let once = sanitize(&raw);
        let twice = sanitize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_output_is_storage_safe(raw in ".*") {
        let canonical = sanitize(&raw);
        prop_assert!(canonical
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'));
        prop_assert!(!canonical.starts_with('_'));
        prop_assert!(!canonical.ends_with('_'));
        if let Some(first) = canonical.chars().next() {
            prop_assert!(!first.is_ascii_digit());
        }
        prop_assert!(!is_reserved(&canonical));
    }
}
