// stageline-store-sqlite/tests/provisioning.rs
// ============================================================================
// Module: SQLite Provisioning Tests
// Description: Validate additive storage provisioning against SQLite tables.
// Purpose: Ensure idempotent ensure, drift tolerance, and guarded recreation.
// Dependencies: stageline-store-sqlite, stageline-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite storage provisioner. Physical table
//! shape is inspected through raw connections so the tests observe what the
//! provisioner actually wrote rather than what it reported.

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

use stageline_core::CanonicalName;
use stageline_core::EntryRepository;
use stageline_core::FieldValue;
use stageline_core::ProcedureConfiguration;
use stageline_core::ProvisionError;
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

fn config_for(path: &std::path::Path) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        read_pool_size: 2,
        registry_max_schema_bytes: None,
        registry_max_entries: None,
    }
}

fn store_for(path: &std::path::Path) -> SqlitePartStore {
    SqlitePartStore::new(config_for(path)).expect("store init")
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

fn physical_columns(path: &std::path::Path, table: &str) -> Vec<String> {
    let connection = rusqlite::Connection::open(path).unwrap();
    let mut statement = connection
        .prepare(&format!("SELECT name FROM pragma_table_info('{table}') ORDER BY cid"))
        .unwrap();
    let rows = statement.query_map(rusqlite::params![], |row| row.get::<_, String>(0)).unwrap();
    rows.collect::<Result<Vec<_>, _>>().unwrap()
}

fn entry_fields(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
    pairs.iter().map(|(name, value)| ((*name).to_string(), value.clone())).collect()
}

// ============================================================================
// SECTION: Ensure Tests
// ============================================================================

#[test]
fn creates_storage_with_schema_and_implicit_columns() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");
    let schema = qc_schema();

    let report = store.ensure_storage(&name, &schema).unwrap();
    assert_eq!(report.storage_name, "entries_part_a");
    assert_eq!(report.columns_added, vec!["usid", "tagNo", "qc", "retest"]);
    assert!(!report.recreated);

    let columns = physical_columns(&path, "entries_part_a");
    assert_eq!(columns, vec!["id", "usid", "tagNo", "qc", "retest", "createdAt", "updatedAt"]);
}

#[test]
fn ensure_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    let schema = qc_schema();

    store.ensure_storage(&name, &schema).unwrap();
    let report = store.ensure_storage(&name, &schema).unwrap();
    assert!(report.columns_added.is_empty());
    assert!(!report.recreated);
}

#[test]
fn ensure_adds_only_missing_columns() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");

    store.ensure_storage(&name, &qc_schema()).unwrap();
    let report = store.ensure_storage(&name, &qc_testing_schema()).unwrap();
    assert_eq!(report.columns_added, vec!["testing"]);

    let columns = physical_columns(&path, "entries_part_a");
    assert!(columns.contains(&"testing".to_string()));
    assert!(columns.contains(&"qc".to_string()));
    assert!(columns.contains(&"retest".to_string()));
}

#[test]
fn ensure_tolerates_externally_added_columns() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");
    let schema = qc_schema();
    store.ensure_storage(&name, &schema).unwrap();

    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute_batch("ALTER TABLE \"entries_part_a\" ADD COLUMN \"extra\" TEXT;")
            .unwrap();
    }

    let report = store.ensure_storage(&name, &schema).unwrap();
    assert!(report.columns_added.is_empty());
    assert!(physical_columns(&path, "entries_part_a").contains(&"extra".to_string()));
}

#[test]
fn ensure_never_drops_columns() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");

    store.ensure_storage(&name, &qc_testing_schema()).unwrap();
    let report = store.ensure_storage(&name, &qc_schema()).unwrap();
    assert!(report.columns_added.is_empty());
    assert!(physical_columns(&path, "entries_part_a").contains(&"testing".to_string()));
}

// ============================================================================
// SECTION: Recreate Tests
// ============================================================================

#[test]
fn recreate_refuses_populated_storage_without_force() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    let schema = qc_schema();
    store.register_or_update(&name, schema.clone()).unwrap();
    store.ensure_storage(&name, &schema).unwrap();
    store
        .create(
            &name,
            entry_fields(&[
                ("usid", FieldValue::Text("U1".to_string())),
                ("tagNo", FieldValue::Text("T1".to_string())),
            ]),
        )
        .unwrap();

    let result = store.recreate(&name, &schema, false);
    assert!(matches!(
        result,
        Err(ProvisionError::WouldLoseData { rows: 1, .. })
    ));
}

#[test]
fn recreate_with_force_clears_rows_and_restarts_ids() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    let schema = qc_schema();
    store.register_or_update(&name, schema.clone()).unwrap();
    store.ensure_storage(&name, &schema).unwrap();
    store
        .create(
            &name,
            entry_fields(&[("usid", FieldValue::Text("U1".to_string()))]),
        )
        .unwrap();

    let report = store.recreate(&name, &schema, true).unwrap();
    assert!(report.recreated);

    assert!(store.query(&name, BTreeMap::new()).unwrap().is_empty());
    let entry = store
        .create(
            &name,
            entry_fields(&[("usid", FieldValue::Text("U2".to_string()))]),
        )
        .unwrap();
    assert_eq!(entry.entry_id.get(), 1);
}

#[test]
fn recreate_empty_storage_succeeds_without_force() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    let schema = qc_schema();
    store.ensure_storage(&name, &schema).unwrap();

    let report = store.recreate(&name, &schema, false).unwrap();
    assert!(report.recreated);
}

#[test]
fn recreate_missing_storage_creates_it() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");

    let report = store.recreate(&name, &qc_schema(), false).unwrap();
    assert!(report.recreated);
    assert_eq!(report.storage_name, "entries_part_a");
    assert!(!physical_columns(&path, "entries_part_a").is_empty());
}

// ============================================================================
// SECTION: Contention Tests
// ============================================================================

#[test]
fn locked_database_maps_to_transient() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let mut config = config_for(&path);
    config.busy_timeout_ms = 1;
    let store = SqlitePartStore::new(config).expect("store init");

    let blocker = rusqlite::Connection::open(&path).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let result = store.ensure_storage(&part("part_a"), &qc_schema());
    assert!(matches!(result, Err(ProvisionError::Transient(_))));

    blocker.execute_batch("COMMIT;").unwrap();
    let report = store.ensure_storage(&part("part_a"), &qc_schema()).unwrap();
    assert!(!report.columns_added.is_empty());
}
