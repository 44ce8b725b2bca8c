// stageline-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Stageline configuration. Output is deterministic
//! and kept in sync with the config model by test.

/// Returns a canonical example `stageline.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[store]
type = "sqlite"
path = "stageline.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000
read_pool_size = 4
max_schema_bytes = 262144
# max_entries = 10000

[sync]
max_attempts = 3
base_delay_ms = 50
max_delay_ms = 1000

[limits]
max_procedure_bytes = 65536
max_custom_checkboxes = 64
max_field_name_length = 64
"#,
    )
}
