// stageline-core/src/runtime/memory.rs
// ============================================================================
// Module: Stageline In-Memory Backends
// Description: In-memory schema registry and storage engine for tests.
// Purpose: Provide deterministic backend implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides in-memory implementations of [`SchemaRegistry`],
//! [`StorageProvisioner`], and [`EntryRepository`] for tests and local
//! demos. Timestamps are logical counters so behavior stays deterministic.
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::core::entry::DataEntry;
use crate::core::entry::FieldValue;
use crate::core::identifiers::CanonicalName;
use crate::core::identifiers::EntryId;
use crate::core::identifiers::FieldName;
use crate::core::schema::FieldDescriptor;
use crate::core::schema::RegisterOutcome;
use crate::core::schema::RegistryEntry;
use crate::core::schema::RegistryPage;
use crate::core::schema::SchemaDefinition;
use crate::core::time::Timestamp;
use crate::interfaces::EntryError;
use crate::interfaces::EntryRepository;
use crate::interfaces::ProvisionError;
use crate::interfaces::ProvisionReport;
use crate::interfaces::RegistryError;
use crate::interfaces::SchemaRegistry;
use crate::interfaces::StorageProvisioner;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default max schema size for the in-memory registry (bytes).
const DEFAULT_MAX_SCHEMA_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: In-Memory Schema Registry
// ============================================================================

/// Cursor payload for registry pagination.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryCursor {
    /// Canonical name of the cursor anchor.
    canonical_name: String,
}

/// In-memory schema registry for tests and examples.
#[derive(Debug, Clone)]
pub struct InMemorySchemaRegistry {
    /// Registry entries protected by a mutex, keyed by canonical name.
    records: Arc<Mutex<BTreeMap<String, RegistryEntry>>>,
    /// Maximum allowed serialized schema size in bytes.
    max_schema_bytes: usize,
    /// Optional maximum number of registered parts.
    max_entries: Option<usize>,
    /// Logical clock for registration timestamps.
    clock: Arc<AtomicU64>,
}

impl Default for InMemorySchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySchemaRegistry {
    /// Creates a new in-memory schema registry with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SCHEMA_BYTES, None)
    }

    /// Creates a new in-memory schema registry with explicit limits.
    #[must_use]
    pub fn with_limits(max_schema_bytes: usize, max_entries: Option<usize>) -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            max_schema_bytes,
            max_entries,
            clock: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Advances the logical clock and returns the new timestamp.
    fn tick(&self) -> Timestamp {
        Timestamp::Logical(self.clock.fetch_add(1, Ordering::Relaxed))
    }
}

impl SchemaRegistry for InMemorySchemaRegistry {
    fn register_or_update(
        &self,
        name: &CanonicalName,
        schema: SchemaDefinition,
    ) -> Result<RegisterOutcome, RegistryError> {
        let schema_bytes = serde_json::to_vec(&schema)
            .map_err(|err| RegistryError::Invalid(err.to_string()))?;
        if schema_bytes.len() > self.max_schema_bytes {
            return Err(RegistryError::Invalid(format!(
                "schema exceeds size limit: {} bytes (max {})",
                schema_bytes.len(),
                self.max_schema_bytes
            )));
        }
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RegistryError::Io("schema registry mutex poisoned".to_string()))?;
        if let Some(existing) = guard.get(name.as_str()) {
            if existing.content_hash == schema.content_hash {
                return Ok(RegisterOutcome {
                    created: false,
                    changed: false,
                    previous: None,
                });
            }
            let previous = existing.schema.clone();
            let registered_at = self.tick();
            let content_hash = schema.content_hash.clone();
            guard.insert(
                name.as_str().to_string(),
                RegistryEntry {
                    canonical_name: name.clone(),
                    schema,
                    storage_name: name.storage_name(),
                    registered_at,
                    content_hash,
                },
            );
            return Ok(RegisterOutcome {
                created: false,
                changed: true,
                previous: Some(previous),
            });
        }
        if let Some(max_entries) = self.max_entries
            && guard.len() >= max_entries
        {
            return Err(RegistryError::Invalid(
                "schema registry max entries exceeded".to_string(),
            ));
        }
        let registered_at = self.tick();
        let content_hash = schema.content_hash.clone();
        guard.insert(
            name.as_str().to_string(),
            RegistryEntry {
                canonical_name: name.clone(),
                schema,
                storage_name: name.storage_name(),
                registered_at,
                content_hash,
            },
        );
        drop(guard);
        Ok(RegisterOutcome {
            created: true,
            changed: false,
            previous: None,
        })
    }

    fn lookup(&self, name: &CanonicalName) -> Result<Option<RegistryEntry>, RegistryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RegistryError::Io("schema registry mutex poisoned".to_string()))?;
        Ok(guard.get(name.as_str()).cloned())
    }

    fn list(&self, cursor: Option<String>, limit: usize) -> Result<RegistryPage, RegistryError> {
        if limit == 0 {
            return Err(RegistryError::Invalid(
                "registry list limit must be greater than zero".to_string(),
            ));
        }
        let records: Vec<RegistryEntry> = {
            let guard = self
                .records
                .lock()
                .map_err(|_| RegistryError::Io("schema registry mutex poisoned".to_string()))?;
            guard.values().cloned().collect()
        };
        let start_index = if let Some(cursor) = cursor {
            let RegistryCursor {
                canonical_name,
            } = serde_json::from_str(&cursor)
                .map_err(|_| RegistryError::Invalid("invalid cursor".to_string()))?;
            records.partition_point(|record| {
                record.canonical_name.as_str() <= canonical_name.as_str()
            })
        } else {
            0
        };
        let remaining = records.len().saturating_sub(start_index);
        let page_items: Vec<RegistryEntry> =
            records.into_iter().skip(start_index).take(limit).collect();
        let next_token = if remaining > page_items.len() {
            page_items
                .last()
                .map(|record| {
                    serde_json::to_string(&RegistryCursor {
                        canonical_name: record.canonical_name.to_string(),
                    })
                    .map_err(|err| RegistryError::Io(err.to_string()))
                })
                .transpose()?
        } else {
            None
        };
        Ok(RegistryPage {
            items: page_items,
            next_token,
        })
    }
}

// ============================================================================
// SECTION: In-Memory Storage Engine
// ============================================================================

/// Column and row state for one provisioned part.
#[derive(Debug, Clone)]
struct TableState {
    /// Backing storage name.
    storage_name: String,
    /// Declared columns in creation order.
    columns: Vec<FieldDescriptor>,
    /// Stored entries keyed by entry id.
    rows: BTreeMap<i64, DataEntry>,
    /// Next entry id to assign.
    next_entry_id: i64,
}

impl TableState {
    /// Creates a fresh table for the given schema.
    fn for_schema(storage_name: String, schema: &SchemaDefinition) -> Self {
        Self {
            storage_name,
            columns: schema.fields.clone(),
            rows: BTreeMap::new(),
            next_entry_id: 1,
        }
    }

    /// Looks up a declared column by exact name.
    fn column(&self, name: &str) -> Option<&FieldDescriptor> {
        self.columns.iter().find(|column| column.name.as_str() == name)
    }
}

/// In-memory storage engine implementing provisioning and entry storage.
#[derive(Debug, Clone)]
pub struct InMemoryStorageEngine {
    /// Table state per canonical part name, protected by a mutex.
    tables: Arc<Mutex<BTreeMap<String, TableState>>>,
    /// Logical clock for entry timestamps.
    clock: Arc<AtomicU64>,
}

impl Default for InMemoryStorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorageEngine {
    /// Creates a new, empty in-memory storage engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(BTreeMap::new())),
            clock: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Advances the logical clock and returns the new timestamp.
    fn tick(&self) -> Timestamp {
        Timestamp::Logical(self.clock.fetch_add(1, Ordering::Relaxed))
    }

    /// Validates provided field names and kinds against declared columns.
    fn check_fields(
        part: &CanonicalName,
        table: &TableState,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<(), EntryError> {
        for (field, value) in fields {
            let Some(column) = table.column(field) else {
                return Err(EntryError::UnknownField {
                    part: part.to_string(),
                    field: field.clone(),
                });
            };
            if value.kind() != column.kind {
                return Err(EntryError::InvalidValue {
                    field: field.clone(),
                    expected: column.kind,
                });
            }
        }
        Ok(())
    }
}

impl StorageProvisioner for InMemoryStorageEngine {
    fn ensure_storage(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
    ) -> Result<ProvisionReport, ProvisionError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| ProvisionError::Fatal("storage engine mutex poisoned".to_string()))?;
        if let Some(table) = guard.get_mut(name.as_str()) {
            let existing: BTreeSet<String> = table
                .columns
                .iter()
                .map(|column| column.name.as_str().to_ascii_lowercase())
                .collect();
            let mut columns_added = Vec::new();
            for field in &schema.fields {
                if existing.contains(&field.name.as_str().to_ascii_lowercase()) {
                    continue;
                }
                // Backfill existing rows with the column default.
                if let Some(default) = FieldValue::default_for(field.kind) {
                    for row in table.rows.values_mut() {
                        row.values.insert(FieldName::new(field.name.as_str()), default.clone());
                    }
                }
                table.columns.push(field.clone());
                columns_added.push(field.name.as_str().to_string());
            }
            return Ok(ProvisionReport {
                storage_name: table.storage_name.clone(),
                columns_added,
                recreated: false,
            });
        }
        let storage_name = name.storage_name();
        let columns_added =
            schema.fields.iter().map(|field| field.name.as_str().to_string()).collect();
        guard.insert(
            name.as_str().to_string(),
            TableState::for_schema(storage_name.clone(), schema),
        );
        drop(guard);
        Ok(ProvisionReport {
            storage_name,
            columns_added,
            recreated: false,
        })
    }

    fn recreate(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
        force: bool,
    ) -> Result<ProvisionReport, ProvisionError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| ProvisionError::Fatal("storage engine mutex poisoned".to_string()))?;
        if let Some(table) = guard.get(name.as_str()) {
            let rows = u64::try_from(table.rows.len()).unwrap_or(u64::MAX);
            if rows > 0 && !force {
                return Err(ProvisionError::WouldLoseData {
                    storage_name: table.storage_name.clone(),
                    rows,
                });
            }
        }
        let storage_name = name.storage_name();
        let columns_added: Vec<String> =
            schema.fields.iter().map(|field| field.name.as_str().to_string()).collect();
        guard.insert(
            name.as_str().to_string(),
            TableState::for_schema(storage_name.clone(), schema),
        );
        drop(guard);
        Ok(ProvisionReport {
            storage_name,
            columns_added,
            recreated: true,
        })
    }
}

impl EntryRepository for InMemoryStorageEngine {
    fn create(
        &self,
        part: &CanonicalName,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| EntryError::Io("storage engine mutex poisoned".to_string()))?;
        let Some(table) = guard.get_mut(part.as_str()) else {
            return Err(EntryError::SchemaNotProvisioned(part.to_string()));
        };
        Self::check_fields(part, table, &fields)?;
        let mut values: BTreeMap<FieldName, FieldValue> = BTreeMap::new();
        for column in &table.columns {
            let value = match fields.get(column.name.as_str()) {
                Some(value) => value.clone(),
                None => FieldValue::default_for(column.kind).ok_or_else(|| {
                    EntryError::Invalid(format!(
                        "column {} requires an explicit value",
                        column.name
                    ))
                })?,
            };
            values.insert(FieldName::new(column.name.as_str()), value);
        }
        let entry_id = EntryId::new(table.next_entry_id);
        table.next_entry_id += 1;
        let now = self.tick();
        let entry = DataEntry {
            entry_id,
            values,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(entry_id.get(), entry.clone());
        drop(guard);
        Ok(entry)
    }

    fn update(
        &self,
        part: &CanonicalName,
        entry_id: EntryId,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<DataEntry, EntryError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| EntryError::Io("storage engine mutex poisoned".to_string()))?;
        let Some(table) = guard.get_mut(part.as_str()) else {
            return Err(EntryError::SchemaNotProvisioned(part.to_string()));
        };
        Self::check_fields(part, table, &fields)?;
        let now = self.tick();
        let Some(row) = table.rows.get_mut(&entry_id.get()) else {
            return Err(EntryError::EntryNotFound(entry_id.get()));
        };
        for (field, value) in fields {
            row.values.insert(FieldName::new(&field), value);
        }
        row.updated_at = now;
        let updated = row.clone();
        drop(guard);
        Ok(updated)
    }

    fn query(
        &self,
        part: &CanonicalName,
        filter: BTreeMap<String, FieldValue>,
    ) -> Result<Vec<DataEntry>, EntryError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| EntryError::Io("storage engine mutex poisoned".to_string()))?;
        let Some(table) = guard.get(part.as_str()) else {
            return Err(EntryError::SchemaNotProvisioned(part.to_string()));
        };
        Self::check_fields(part, table, &filter)?;
        let matches: Vec<DataEntry> = table
            .rows
            .values()
            .filter(|row| {
                filter
                    .iter()
                    .all(|(field, expected)| row.value(field) == Some(expected))
            })
            .cloned()
            .collect();
        drop(guard);
        Ok(matches)
    }
}
