// stageline-store-sqlite/tests/part_store.rs
// ============================================================================
// Module: SQLite Part Store Tests
// Description: Validate SQLite-backed schema registry behavior.
// Purpose: Ensure durable registrations, integrity checks, and config limits.
// Dependencies: stageline-store-sqlite, stageline-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed schema registry. Exercises
//! durability across store instances, hash verification on load, keyset
//! pagination, and fail-closed configuration validation. Database contents
//! are modeled as untrusted input.

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

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use stageline_core::CanonicalName;
use stageline_core::ProcedureConfiguration;
use stageline_core::RegistryError;
use stageline_core::SchemaDefinition;
use stageline_core::SchemaRegistry;
use stageline_core::synthesize;
use stageline_store_sqlite::MAX_SCHEMA_BYTES;
use stageline_store_sqlite::SqlitePartStore;
use stageline_store_sqlite::SqliteStoreConfig;
use stageline_store_sqlite::SqliteStoreError;
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

// ============================================================================
// SECTION: Registry Tests
// ============================================================================

#[test]
fn registry_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("EICS112 Part");
    let schema = qc_schema();

    let outcome = store.register_or_update(&name, schema.clone()).unwrap();
    assert!(outcome.created);
    assert!(!outcome.changed);

    let entry = store.lookup(&name).unwrap().expect("registered entry");
    assert_eq!(entry.canonical_name.as_str(), "eics112_part");
    assert_eq!(entry.storage_name, "entries_eics112_part");
    assert_eq!(entry.schema, schema);
    assert_eq!(entry.content_hash, schema.content_hash);
}

#[test]
fn register_same_schema_is_a_noop() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");

    store.register_or_update(&name, qc_schema()).unwrap();
    let outcome = store.register_or_update(&name, qc_schema()).unwrap();
    assert!(!outcome.created);
    assert!(!outcome.changed);
    assert!(outcome.previous.is_none());
}

#[test]
fn register_changed_schema_returns_previous() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    let original = qc_schema();
    let updated = qc_testing_schema();

    store.register_or_update(&name, original.clone()).unwrap();
    let outcome = store.register_or_update(&name, updated.clone()).unwrap();
    assert!(!outcome.created);
    assert!(outcome.changed);
    assert_eq!(outcome.previous, Some(original));

    let entry = store.lookup(&name).unwrap().expect("registered entry");
    assert_eq!(entry.schema, updated);
}

#[test]
fn lookup_missing_part_returns_none() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    assert!(store.lookup(&part("ghost")).unwrap().is_none());
}

#[test]
fn registrations_persist_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let name = part("part_a");
    let schema = qc_schema();
    {
        let store = store_for(&path);
        store.register_or_update(&name, schema.clone()).unwrap();
    }
    let store = store_for(&path);
    let entry = store.lookup(&name).unwrap().expect("persisted entry");
    assert_eq!(entry.schema, schema);

    let outcome = store.register_or_update(&name, schema).unwrap();
    assert!(!outcome.created);
    assert!(!outcome.changed);
}

#[test]
fn list_pages_in_canonical_name_order() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    for raw in ["part_b", "part_c", "part_a"] {
        store.register_or_update(&part(raw), qc_schema()).unwrap();
    }

    let first = store.list(None, 2).unwrap();
    let first_names: Vec<&str> =
        first.items.iter().map(|entry| entry.canonical_name.as_str()).collect();
    assert_eq!(first_names, vec!["part_a", "part_b"]);
    let token = first.next_token.expect("continuation token");

    let second = store.list(Some(token), 2).unwrap();
    let second_names: Vec<&str> =
        second.items.iter().map(|entry| entry.canonical_name.as_str()).collect();
    assert_eq!(second_names, vec!["part_c"]);
    assert!(second.next_token.is_none());
}

#[test]
fn list_rejects_zero_limit() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let result = store.list(None, 0);
    assert!(matches!(result, Err(RegistryError::Invalid(_))));
}

#[test]
fn list_rejects_invalid_cursor() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.register_or_update(&part("part_a"), qc_schema()).unwrap();
    let result = store.list(Some("not a cursor".to_string()), 4);
    assert!(matches!(result, Err(RegistryError::Invalid(_))));
}

// ============================================================================
// SECTION: Integrity Tests
// ============================================================================

#[test]
fn lookup_detects_corrupt_schema_hash() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");
    store.register_or_update(&name, qc_schema()).unwrap();

    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE schema_registry SET schema_hash = 'bad' WHERE canonical_name = ?1",
                rusqlite::params![name.as_str()],
            )
            .unwrap();
    }

    let result = store.lookup(&name);
    assert!(matches!(result, Err(RegistryError::Corrupt(_))));
}

#[test]
fn lookup_detects_tampered_schema_payload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");
    store.register_or_update(&name, qc_schema()).unwrap();

    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE schema_registry SET schema_json = X'7b7d' WHERE canonical_name = ?1",
                rusqlite::params![name.as_str()],
            )
            .unwrap();
    }

    let result = store.lookup(&name);
    assert!(matches!(result, Err(RegistryError::Corrupt(_))));
}

#[test]
fn lookup_rejects_unknown_hash_algorithm() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    let name = part("part_a");
    store.register_or_update(&name, qc_schema()).unwrap();

    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE schema_registry SET hash_algorithm = 'md5' WHERE canonical_name = ?1",
                rusqlite::params![name.as_str()],
            )
            .unwrap();
    }

    let result = store.lookup(&name);
    assert!(matches!(result, Err(RegistryError::Invalid(_))));
}

#[test]
fn open_rejects_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    {
        let _store = store_for(&path);
    }

    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection.execute("UPDATE store_meta SET version = 999", rusqlite::params![]).unwrap();
    }

    let result = SqlitePartStore::new(config_for(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: Config Validation Tests
// ============================================================================

#[test]
fn open_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqlitePartStore::new(config_for(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn open_rejects_overlong_path_component() {
    let temp = TempDir::new().unwrap();
    let component = "x".repeat(300);
    let result = SqlitePartStore::new(config_for(&temp.path().join(component)));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn open_rejects_overlong_total_path() {
    let temp = TempDir::new().unwrap();
    let component = "y".repeat(5_000);
    let result = SqlitePartStore::new(config_for(&temp.path().join(component)));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn open_rejects_zero_read_pool() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(&temp.path().join("store.sqlite"));
    config.read_pool_size = 0;
    let result = SqlitePartStore::new(config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn open_rejects_out_of_range_schema_limit() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(&temp.path().join("store.sqlite"));
    config.registry_max_schema_bytes = Some(MAX_SCHEMA_BYTES + 1);
    let result = SqlitePartStore::new(config);
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn register_rejects_oversized_schema() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(&temp.path().join("store.sqlite"));
    config.registry_max_schema_bytes = Some(64);
    let store = SqlitePartStore::new(config).expect("store init");
    let result = store.register_or_update(&part("part_a"), qc_schema());
    assert!(matches!(result, Err(RegistryError::Invalid(_))));
}

#[test]
fn register_enforces_max_entries_for_new_parts_only() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(&temp.path().join("store.sqlite"));
    config.registry_max_entries = Some(1);
    let store = SqlitePartStore::new(config).expect("store init");

    store.register_or_update(&part("part_a"), qc_schema()).unwrap();
    let rejected = store.register_or_update(&part("part_b"), qc_schema());
    assert!(matches!(rejected, Err(RegistryError::Invalid(_))));

    // Updating the existing part stays within the cap.
    let outcome = store.register_or_update(&part("part_a"), qc_testing_schema()).unwrap();
    assert!(outcome.changed);
}

// ============================================================================
// SECTION: Concurrency and Stats Tests
// ============================================================================

#[test]
fn concurrent_registrations_create_exactly_once() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("store.sqlite")));
    let created = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0 .. 8 {
        let store = Arc::clone(&store);
        let created = Arc::clone(&created);
        handles.push(std::thread::spawn(move || {
            let outcome = store.register_or_update(&part("part_a"), qc_schema()).unwrap();
            if outcome.created {
                created.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn perf_stats_track_operations() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let name = part("part_a");
    store.register_or_update(&name, qc_schema()).unwrap();
    store.lookup(&name).unwrap();
    store.list(None, 4).unwrap();

    let snapshot = store.perf_stats_snapshot();
    assert_eq!(snapshot.op_counts.register, 1);
    // Listing loads each page entry through the verified lookup path, so the
    // lookup counter only covers direct calls.
    assert_eq!(snapshot.op_counts.lookup, 1);
    assert_eq!(snapshot.op_counts.list, 1);

    store.reset_perf_stats();
    let reset = store.perf_stats_snapshot();
    assert_eq!(reset.op_counts.register, 0);
    assert_eq!(reset.op_counts.lookup, 0);
}
