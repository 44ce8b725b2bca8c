// stageline-store-sqlite/tests/entries.rs
// ============================================================================
// Module: SQLite Entry Repository Tests
// Description: Validate entry create, update, and query against SQLite.
// Purpose: Ensure field validation, defaults, ordering, and durability.
// Dependencies: stageline-store-sqlite, stageline-core, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite entry repository. Every write must be
//! gated on a registered schema and a provisioned table, unknown fields and
//! kind mismatches are rejected, and query results come back in stable
//! identifier order.

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use stageline_core::CanonicalName;
use stageline_core::EntryError;
use stageline_core::EntryId;
use stageline_core::EntryRepository;
use stageline_core::FieldKind;
use stageline_core::FieldValue;
use stageline_core::ProcedureConfiguration;
use stageline_core::SchemaDefinition;
use stageline_core::SchemaRegistry;
use stageline_core::StorageProvisioner;
use stageline_core::synthesize;
use stageline_store_sqlite::SqlitePartStore;
use stageline_store_sqlite::SqliteStoreConfig;
use stageline_store_sqlite::SqliteStoreMode;
use stageline_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(path: &std::path::Path) -> SqlitePartStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
        registry_max_schema_bytes: None,
        registry_max_entries: None,
    };
    SqlitePartStore::new(config).expect("store init")
}

fn part(raw: &str) -> CanonicalName {
    CanonicalName::from_raw(raw).expect("canonical name")
}

fn qc_schema() -> SchemaDefinition {
    let config = ProcedureConfiguration::from_json_str(
        r#"{"qc": {"enabled": true, "custom_checkboxes": [{"name": "Retest", "label": "Retest"}]}}"#,
    )
    .expect("parse config");
    synthesize(&config).expect("synthesize")
}

fn qc_testing_schema() -> SchemaDefinition {
    let config = ProcedureConfiguration::from_json_str(
        r#"{
            "testing": {"enabled": true},
            "qc": {"enabled": true, "custom_checkboxes": [{"name": "Retest", "label": "Retest"}]}
        }"#,
    )
    .expect("parse config");
    synthesize(&config).expect("synthesize")
}

/// Registers and provisions `raw` in a fresh store rooted at `temp`.
fn provisioned(temp: &TempDir, raw: &str) -> (SqlitePartStore, CanonicalName) {
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part(raw);
    let schema = qc_schema();
    store.register_or_update(&name, schema.clone()).expect("register");
    store.ensure_storage(&name, &schema).expect("ensure");
    (store, name)
}

fn fields(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
    pairs.iter().map(|(key, value)| ((*key).to_string(), value.clone())).collect()
}

// ============================================================================
// SECTION: Create Tests
// ============================================================================

#[test]
fn create_and_query_by_flag() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let created = store
        .create(
            &name,
            fields(&[
                ("usid", FieldValue::from("U1")),
                ("tagNo", FieldValue::from("T1")),
                ("qc", FieldValue::from(true)),
            ]),
        )
        .unwrap();

    let matches = store.query(&name, fields(&[("qc", FieldValue::from(true))])).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0], created);
    assert_eq!(matches[0].value("usid"), Some(&FieldValue::from("U1")));
    assert_eq!(matches[0].value("tagNo"), Some(&FieldValue::from("T1")));
    assert_eq!(matches[0].value("retest"), Some(&FieldValue::from(false)));
}

#[test]
fn create_fills_defaults_for_omitted_fields() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let created = store.create(&name, fields(&[("usid", FieldValue::from("U1"))])).unwrap();
    assert_eq!(created.value("tagNo"), Some(&FieldValue::from("")));
    assert_eq!(created.value("qc"), Some(&FieldValue::from(false)));
    assert_eq!(created.value("retest"), Some(&FieldValue::from(false)));
    assert_eq!(created.created_at, created.updated_at);
}

#[test]
fn create_assigns_sequential_ids() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let first = store.create(&name, fields(&[("usid", FieldValue::from("U1"))])).unwrap();
    let second = store.create(&name, fields(&[("usid", FieldValue::from("U2"))])).unwrap();
    assert_eq!(first.entry_id.get(), 1);
    assert_eq!(second.entry_id.get(), 2);
}

#[test]
fn create_requires_registration() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let err = store.create(&part("ghost"), BTreeMap::new()).unwrap_err();
    assert!(matches!(err, EntryError::SchemaNotProvisioned(_)));
}

#[test]
fn create_requires_physical_storage() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    store.register_or_update(&name, qc_schema()).unwrap();

    // Registered but never provisioned.
    let err = store.create(&name, BTreeMap::new()).unwrap_err();
    assert!(matches!(err, EntryError::SchemaNotProvisioned(_)));
}

#[test]
fn create_rejects_unknown_field() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let err = store.create(&name, fields(&[("warranty", FieldValue::from(true))])).unwrap_err();
    let EntryError::UnknownField { part, field } = err else {
        panic!("expected unknown field error, got {err:?}");
    };
    assert_eq!(part, "part_a");
    assert_eq!(field, "warranty");
}

#[test]
fn create_rejects_kind_mismatch() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let err = store.create(&name, fields(&[("qc", FieldValue::from("yes"))])).unwrap_err();
    let EntryError::InvalidValue { field, expected } = err else {
        panic!("expected invalid value error, got {err:?}");
    };
    assert_eq!(field, "qc");
    assert_eq!(expected, FieldKind::Boolean);
}

#[test]
fn field_names_match_exactly() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    let err = store.create(&name, fields(&[("TAGNO", FieldValue::from("T1"))])).unwrap_err();
    assert!(matches!(err, EntryError::UnknownField { .. }));
}

// ============================================================================
// SECTION: Query Tests
// ============================================================================

#[test]
fn query_filters_conjunctively() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");

    store
        .create(
            &name,
            fields(&[("usid", FieldValue::from("U1")), ("qc", FieldValue::from(true))]),
        )
        .unwrap();
    store
        .create(
            &name,
            fields(&[("usid", FieldValue::from("U2")), ("qc", FieldValue::from(true))]),
        )
        .unwrap();
    store
        .create(
            &name,
            fields(&[("usid", FieldValue::from("U3")), ("qc", FieldValue::from(false))]),
        )
        .unwrap();

    let matches = store
        .query(
            &name,
            fields(&[("qc", FieldValue::from(true)), ("usid", FieldValue::from("U2"))]),
        )
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].value("usid"), Some(&FieldValue::from("U2")));
}

#[test]
fn query_with_empty_filter_returns_all_in_id_order() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    for usid in ["U1", "U2", "U3"] {
        store.create(&name, fields(&[("usid", FieldValue::from(usid))])).unwrap();
    }

    let all = store.query(&name, BTreeMap::new()).unwrap();
    let ids: Vec<i64> = all.iter().map(|entry| entry.entry_id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    // Repeated reads return the same order.
    let again = store.query(&name, BTreeMap::new()).unwrap();
    assert_eq!(all, again);
}

#[test]
fn query_rejects_unknown_filter_field() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    let err = store.query(&name, fields(&[("warranty", FieldValue::from(true))])).unwrap_err();
    assert!(matches!(err, EntryError::UnknownField { .. }));
}

#[test]
fn query_requires_registration() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let err = store.query(&part("ghost"), BTreeMap::new()).unwrap_err();
    assert!(matches!(err, EntryError::SchemaNotProvisioned(_)));
}

// ============================================================================
// SECTION: Update Tests
// ============================================================================

#[test]
fn update_overwrites_fields_and_bumps_updated_at() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    let created = store.create(&name, fields(&[("usid", FieldValue::from("U1"))])).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let updated = store
        .update(&name, created.entry_id, fields(&[("qc", FieldValue::from(true))]))
        .unwrap();

    assert_eq!(updated.entry_id, created.entry_id);
    assert_eq!(updated.value("qc"), Some(&FieldValue::from(true)));
    assert_eq!(updated.value("usid"), Some(&FieldValue::from("U1")));
    assert_eq!(updated.created_at, created.created_at);

    let before = created.updated_at.as_unix_millis().expect("unix millis");
    let after = updated.updated_at.as_unix_millis().expect("unix millis");
    assert!(after > before);
}

#[test]
fn update_missing_entry_errors() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    let err = store
        .update(&name, EntryId::new(42), fields(&[("qc", FieldValue::from(true))]))
        .unwrap_err();
    assert!(matches!(err, EntryError::EntryNotFound(42)));
}

#[test]
fn update_rejects_unknown_field() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    let created = store.create(&name, fields(&[("usid", FieldValue::from("U1"))])).unwrap();
    let err = store
        .update(&name, created.entry_id, fields(&[("warranty", FieldValue::from(true))]))
        .unwrap_err();
    assert!(matches!(err, EntryError::UnknownField { .. }));
}

// ============================================================================
// SECTION: Durability and Evolution Tests
// ============================================================================

#[test]
fn entries_persist_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let name = part("part_a");
    {
        let store = store_for(&path);
        let schema = qc_schema();
        store.register_or_update(&name, schema.clone()).unwrap();
        store.ensure_storage(&name, &schema).unwrap();
        store
            .create(
                &name,
                fields(&[("usid", FieldValue::from("U1")), ("qc", FieldValue::from(true))]),
            )
            .unwrap();
    }

    let store = store_for(&path);
    let all = store.query(&name, BTreeMap::new()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value("usid"), Some(&FieldValue::from("U1")));
    assert_eq!(all[0].value("qc"), Some(&FieldValue::from(true)));
}

#[test]
fn schema_evolution_backfills_defaults() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    store.create(&name, fields(&[("usid", FieldValue::from("U1"))])).unwrap();

    let evolved = qc_testing_schema();
    store.register_or_update(&name, evolved.clone()).unwrap();
    let report = store.ensure_storage(&name, &evolved).unwrap();
    assert_eq!(report.columns_added, vec!["testing"]);

    let all = store.query(&name, BTreeMap::new()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value("testing"), Some(&FieldValue::from(false)));
    assert_eq!(all[0].value("usid"), Some(&FieldValue::from("U1")));
}

#[test]
fn concurrent_creates_assign_unique_ids() {
    let temp = TempDir::new().unwrap();
    let (store, name) = provisioned(&temp, "part_a");
    let store = Arc::new(store);
    let mut handles = Vec::new();

    for index in 0 .. 8 {
        let store = Arc::clone(&store);
        let name = name.clone();
        handles.push(std::thread::spawn(move || {
            let usid = format!("U{index}");
            store
                .create(&name, fields(&[("usid", FieldValue::from(usid))]))
                .unwrap()
                .entry_id
                .get()
        }));
    }

    let ids: BTreeSet<i64> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(ids, (1 ..= 8).collect());
}
