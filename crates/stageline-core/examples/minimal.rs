// crates/stageline-core/examples/minimal.rs
// ============================================================================
// Module: Stageline Minimal Example
// Description: Minimal end-to-end schema apply using in-memory backends.
// Purpose: Demonstrate procedure apply, entry create/query, and re-sync.
// Dependencies: stageline-core
// ============================================================================

//! ## Overview
//! Applies a procedure configuration to one part using the in-memory registry
//! and storage engine, writes an entry, reads it back, and re-syncs the
//! registered parts. This example is backend-agnostic and suitable for quick
//! verification.

use std::collections::BTreeMap;
use std::sync::Arc;

use stageline_core::CancelFlag;
use stageline_core::EntryRepository;
use stageline_core::FieldValue;
use stageline_core::InMemorySchemaRegistry;
use stageline_core::InMemoryStorageEngine;
use stageline_core::ProcedureConfiguration;
use stageline_core::ProcedureCoordinator;
use stageline_core::ResyncRequest;

/// Error type for example preconditions.
#[derive(Debug)]
struct ExampleError(&'static str);

impl std::fmt::Display for ExampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ExampleError {}

/// Procedure configuration with two enabled stages and one custom checkbox.
const PROCEDURE_JSON: &str = r#"{
    "qc": {
        "enabled": true,
        "custom_checkboxes": [{"name": "Retest", "label": "Retest required"}]
    },
    "testing": {"enabled": true},
    "packing": {"enabled": false}
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProcedureConfiguration::from_json_str(PROCEDURE_JSON)?;
    let registry = Arc::new(InMemorySchemaRegistry::new());
    let engine = Arc::new(InMemoryStorageEngine::new());
    let coordinator = ProcedureCoordinator::new(registry, engine.clone());

    let report = coordinator.apply("EICS-112 Part", &config)?;
    if report.storage_name != "entries_eics_112_part" {
        return Err(Box::new(ExampleError("unexpected storage name")));
    }

    let mut values = BTreeMap::new();
    values.insert("usid".to_string(), FieldValue::Text("U100".to_string()));
    values.insert("qc".to_string(), FieldValue::Boolean(true));
    let name = report.canonical_name.clone();
    let created = engine.create(&name, values)?;

    let mut filter = BTreeMap::new();
    filter.insert("qc".to_string(), FieldValue::Boolean(true));
    let entries = engine.query(&name, filter)?;
    let found = entries.first().ok_or(ExampleError("expected one matching entry"))?;
    if entries.len() != 1 || found.entry_id != created.entry_id {
        return Err(Box::new(ExampleError("query did not return the created entry")));
    }

    let request = ResyncRequest {
        part: None,
        force: false,
    };
    let resync = coordinator.resync(&request, &CancelFlag::new())?;
    if resync.cancelled || resync.parts.len() != 1 {
        return Err(Box::new(ExampleError("expected one re-synced part")));
    }
    Ok(())
}
