// crates/stageline-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for input bounds, locale resolution, and rendering.
// Purpose: Ensure CLI helpers fail closed and render reports deterministically.
// Dependencies: stageline-cli main helpers, stageline-core, tempfile
// ============================================================================

//! ## Overview
//! Validates the private helpers of the CLI entry point: bounded file reads,
//! locale resolution precedence, part-name argument parsing, and the text
//! renderers for sync and registry reports.
//!
//! Security posture: CLI inputs are untrusted; size limits must fail closed.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;

use stageline_cli::i18n::Locale;
use stageline_core::CanonicalName;
use stageline_core::DataEntry;
use stageline_core::EntryId;
use stageline_core::FieldName;
use stageline_core::FieldValue;
use stageline_core::PartSyncReport;
use stageline_core::ProcedureConfiguration;
use stageline_core::RegistryEntry;
use stageline_core::RegistryPage;
use stageline_core::ResyncReport;
use stageline_core::Timestamp;
use stageline_core::synthesize;
use tempfile::TempDir;

use super::LangArg;
use super::ReadLimitError;
use super::format_columns;
use super::format_values;
use super::parse_part_name;
use super::read_bytes_with_limit;
use super::render_entries_text;
use super::render_registry_list_text;
use super::render_resync_text;
use super::resolve_locale;

// ============================================================================
// SECTION: Input Bounds
// ============================================================================

#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("small.json");
    fs::write(&path, b"ok").expect("write small file");

    let bytes = read_bytes_with_limit(&path, 16).expect("read small file");
    assert_eq!(bytes, b"ok");
}

#[test]
fn read_bytes_with_limit_rejects_large_file() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("large.json");
    let limit = 8_usize;
    fs::write(&path, vec![0_u8; limit + 1]).expect("write large file");

    let err = read_bytes_with_limit(&path, limit).expect_err("expected size limit failure");
    match err {
        ReadLimitError::TooLarge {
            size,
            limit: reported,
        } => {
            assert_eq!(size, 9);
            assert_eq!(reported, limit);
        }
        ReadLimitError::Io(err) => panic!("expected TooLarge, got io error: {err}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_file_as_io() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("missing.json");

    let err = read_bytes_with_limit(&path, 16).expect_err("expected io failure");
    assert!(matches!(err, ReadLimitError::Io(_)));
}

// ============================================================================
// SECTION: Locale Resolution
// ============================================================================

#[test]
fn resolve_locale_prefers_flag_over_env() {
    let locale = resolve_locale(Some(LangArg::Es), Some("en")).expect("resolve locale");
    assert_eq!(locale, Locale::Es);
}

#[test]
fn resolve_locale_parses_env_values() {
    assert_eq!(resolve_locale(None, Some("en-US")).expect("resolve locale"), Locale::En);
    assert_eq!(resolve_locale(None, Some("es_MX")).expect("resolve locale"), Locale::Es);
}

#[test]
fn resolve_locale_rejects_unknown_env_value() {
    let err = resolve_locale(None, Some("tlh")).expect_err("expected invalid env failure");
    assert!(err.to_string().contains("tlh"));
}

#[test]
fn resolve_locale_defaults_to_english() {
    let locale = resolve_locale(None, None).expect("resolve locale");
    assert_eq!(locale, Locale::En);
}

// ============================================================================
// SECTION: Part Name Arguments
// ============================================================================

#[test]
fn parse_part_name_sanitizes_raw_input() {
    let name = parse_part_name("EICS112 Part").expect("parse part name");
    assert_eq!(name.as_str(), "eics112_part");
}

#[test]
fn parse_part_name_rejects_symbol_only_input() {
    let err = parse_part_name("!!!").expect_err("expected invalid part name");
    assert!(err.to_string().contains("!!!"));
}

// ============================================================================
// SECTION: Text Rendering
// ============================================================================

#[test]
fn format_columns_joins_or_labels_empty() {
    assert_eq!(format_columns(&[]), "none");
    assert_eq!(format_columns(&["qc".to_string(), "retest".to_string()]), "qc,retest");
}

#[test]
fn render_entries_text_shows_ids_timestamps_and_values() {
    let mut values = BTreeMap::new();
    values.insert(FieldName::new("usid"), FieldValue::from("U100"));
    values.insert(FieldName::new("qc"), FieldValue::from(true));
    let entries = vec![DataEntry {
        entry_id: EntryId::new(7),
        values,
        created_at: Timestamp::UnixMillis(1_700_000_000_000),
        updated_at: Timestamp::Logical(42),
    }];
    let text = render_entries_text(&entries);
    assert!(text.contains("id=7"));
    assert!(text.contains("created_at=1700000000000"));
    assert!(text.contains("updated_at=logical:42"));
    assert!(text.contains("qc=true usid=U100"));
}

#[test]
fn format_values_renders_sorted_pairs() {
    let mut values = BTreeMap::new();
    values.insert(FieldName::new("usid"), FieldValue::from("U100"));
    values.insert(FieldName::new("qc"), FieldValue::from(true));
    assert_eq!(format_values(&values), "qc=true usid=U100");
}

#[test]
fn render_resync_text_reports_failures() {
    let report = ResyncReport {
        parts: vec![
            PartSyncReport {
                canonical_name: CanonicalName::from_raw("part_a").expect("canonical name"),
                created: false,
                changed: true,
                columns_added: vec!["testing".to_string()],
                error: None,
            },
            PartSyncReport {
                canonical_name: CanonicalName::from_raw("part_b").expect("canonical name"),
                created: false,
                changed: false,
                columns_added: Vec::new(),
                error: Some("storage offline".to_string()),
            },
        ],
        cancelled: false,
    };

    let text = render_resync_text(&report);
    assert!(text.contains("part_a: created=false changed=true columns_added=testing"));
    assert!(text.contains("part_b: failed: storage offline"));
    assert!(!text.contains("cancelled"));
}

#[test]
fn render_registry_list_text_includes_continuation_hint() {
    let procedure = ProcedureConfiguration::from_json_str(r#"{"qc": {"enabled": true}}"#)
        .expect("parse procedure");
    let schema = synthesize(&procedure).expect("synthesize schema");
    let entry = RegistryEntry {
        canonical_name: CanonicalName::from_raw("EICS112 Part").expect("canonical name"),
        storage_name: "entries_eics112_part".to_string(),
        registered_at: Timestamp::UnixMillis(1_700_000_000_000),
        content_hash: schema.content_hash.clone(),
        schema,
    };
    let page = RegistryPage {
        items: vec![entry],
        next_token: Some("c:eics112_part".to_string()),
    };

    let text = render_registry_list_text(&page);
    assert!(text.contains("eics112_part storage=entries_eics112_part"));
    assert!(text.contains("c:eics112_part"));
}
