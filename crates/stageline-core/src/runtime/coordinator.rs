// stageline-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Stageline Procedure Coordinator
// Description: Two-phase apply and bulk re-sync over registry and provisioner.
// Purpose: Serialize per-part schema lifecycle work with explicit ordering.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The coordinator owns the explicit two-phase workflow: sanitize the part
//! name, synthesize the schema, then register-or-update and ensure-storage
//! under a per-part lock. Different parts proceed in parallel; the same part
//! serializes. Bulk re-sync walks the registry, isolates per-part failures
//! into the batch report, and honors cooperative cancellation between
//! per-part units of work.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CanonicalName;
use crate::core::procedure::ProcedureConfiguration;
use crate::core::sanitize::SanitizeError;
use crate::core::schema::RegistryEntry;
use crate::core::schema::SchemaDefinition;
use crate::core::schema::SynthesisError;
use crate::core::schema::synthesize;
use crate::interfaces::ProvisionError;
use crate::interfaces::ProvisionReport;
use crate::interfaces::RegistryError;
use crate::interfaces::SchemaRegistry;
use crate::interfaces::StorageProvisioner;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Registry page size used when bulk re-sync walks all parts.
const RESYNC_PAGE_SIZE: usize = 64;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cooperative cancellation flag shared across threads.
///
/// Checked between per-part units of work; a set flag stops the batch after
/// the current part completes, so storage is never left half-created.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    /// Shared cancellation state.
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a new, unset cancellation flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded exponential backoff applied to transient provisioning failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay preceding the given retry attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 1_u64 << exponent;
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Result of a two-phase procedure apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Canonical part name the procedure applied to.
    pub canonical_name: CanonicalName,
    /// Backing storage name reconciled for the part.
    pub storage_name: String,
    /// True when the registry entry was created by this call.
    pub created: bool,
    /// True when an existing registration was replaced.
    pub changed: bool,
    /// Physical columns added by storage reconciliation.
    pub columns_added: Vec<String>,
}

/// Bulk re-sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncRequest {
    /// Optional raw part name; when absent every registered part is synced.
    pub part: Option<String>,
    /// Destructively rebuild storage instead of additive repair.
    pub force: bool,
}

/// Per-part outcome within a bulk re-sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSyncReport {
    /// Canonical part name.
    pub canonical_name: CanonicalName,
    /// True when the registry entry was created by this sync.
    pub created: bool,
    /// True when the registration was replaced by this sync.
    pub changed: bool,
    /// Physical columns added by storage reconciliation.
    pub columns_added: Vec<String>,
    /// Failure message when this part could not be synced.
    pub error: Option<String>,
}

/// Batch report for a bulk re-sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    /// Per-part outcomes in processing order.
    pub parts: Vec<PartSyncReport>,
    /// True when cancellation stopped the batch before completion.
    pub cancelled: bool,
}

impl ResyncReport {
    /// Returns whether any part failed to sync.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.parts.iter().any(|part| part.error.is_some())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Coordinator errors carrying part and operation context.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Raw part name cannot yield a usable identifier.
    #[error(transparent)]
    InvalidIdentifier(#[from] SanitizeError),
    /// Schema synthesis failed.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    /// Registry operation failed.
    #[error("registry operation failed for part {name}: {source}")]
    Registry {
        /// Canonical part name.
        name: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// Provisioning failed after exhausting retries or with a fatal error.
    #[error("provisioning {operation} failed for part {name}: {source}")]
    Provisioning {
        /// Canonical part name.
        name: String,
        /// Attempted operation label.
        operation: &'static str,
        /// Underlying provisioning error.
        #[source]
        source: ProvisionError,
    },
    /// A per-part lock was poisoned by a panicking holder.
    #[error("part lock poisoned for {0}")]
    LockPoisoned(String),
}

// ============================================================================
// SECTION: Part Locks
// ============================================================================

/// Per-part lock map guarding registration and provisioning.
///
/// # Invariants
/// - The map mutex is held only to fetch or insert a lock handle; the
///   per-name mutex is acquired after the map mutex is released so parts
///   never block one another.
#[derive(Debug, Default)]
struct PartLocks {
    /// Lock handles keyed by canonical name.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PartLocks {
    /// Returns the lock handle for a canonical name, creating it if needed.
    fn handle(&self, name: &CanonicalName) -> Result<Arc<Mutex<()>>, CoordinatorError> {
        let mut guard = self
            .locks
            .lock()
            .map_err(|_| CoordinatorError::LockPoisoned(name.to_string()))?;
        let handle = guard.entry(name.as_str().to_string()).or_default();
        Ok(Arc::clone(handle))
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Orchestrates sanitize → synthesize → register → provision for parts.
pub struct ProcedureCoordinator {
    /// Schema registry backend.
    registry: Arc<dyn SchemaRegistry + Send + Sync>,
    /// Storage provisioner backend.
    provisioner: Arc<dyn StorageProvisioner + Send + Sync>,
    /// Per-part serialization locks.
    locks: PartLocks,
    /// Retry policy for transient provisioning failures.
    retry: RetryPolicy,
}

impl ProcedureCoordinator {
    /// Creates a coordinator with the default retry policy.
    #[must_use]
    pub fn new(
        registry: Arc<dyn SchemaRegistry + Send + Sync>,
        provisioner: Arc<dyn StorageProvisioner + Send + Sync>,
    ) -> Self {
        Self::with_retry_policy(registry, provisioner, RetryPolicy::default())
    }

    /// Creates a coordinator with an explicit retry policy.
    #[must_use]
    pub fn with_retry_policy(
        registry: Arc<dyn SchemaRegistry + Send + Sync>,
        provisioner: Arc<dyn StorageProvisioner + Send + Sync>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            provisioner,
            locks: PartLocks::default(),
            retry,
        }
    }

    /// Applies a procedure configuration to a part end to end.
    ///
    /// Sanitizes the raw name, synthesizes the schema, and then registers
    /// it and reconciles backing storage under the per-part lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError`] when any phase fails; transient
    /// provisioning failures are retried with bounded backoff first.
    pub fn apply(
        &self,
        raw_name: &str,
        config: &ProcedureConfiguration,
    ) -> Result<ApplyReport, CoordinatorError> {
        let name = CanonicalName::from_raw(raw_name)?;
        let schema = synthesize(config)?;
        let handle = self.locks.handle(&name)?;
        let guard =
            handle.lock().map_err(|_| CoordinatorError::LockPoisoned(name.to_string()))?;
        let outcome = self.registry.register_or_update(&name, schema.clone()).map_err(
            |source| CoordinatorError::Registry {
                name: name.to_string(),
                source,
            },
        )?;
        let provision = self.provision_with_retry(&name, "ensure", || {
            self.provisioner.ensure_storage(&name, &schema)
        })?;
        drop(guard);
        Ok(ApplyReport {
            canonical_name: name,
            storage_name: provision.storage_name,
            created: outcome.created,
            changed: outcome.changed,
            columns_added: provision.columns_added,
        })
    }

    /// Re-syncs one part or every registered part against its stored schema.
    ///
    /// Per-part failures are captured in the report rather than aborting
    /// the batch; cancellation is honored between per-part units.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError`] when the request names an invalid part
    /// or the registry walk itself fails. Per-part provisioning failures
    /// never surface here.
    pub fn resync(
        &self,
        request: &ResyncRequest,
        cancel: &CancelFlag,
    ) -> Result<ResyncReport, CoordinatorError> {
        let mut report = ResyncReport::default();
        if let Some(raw) = &request.part {
            let name = CanonicalName::from_raw(raw)?;
            let entry = self.registry.lookup(&name).map_err(|source| {
                CoordinatorError::Registry {
                    name: name.to_string(),
                    source,
                }
            })?;
            match entry {
                Some(entry) => report.parts.push(self.sync_part(&entry, request.force)),
                None => report.parts.push(PartSyncReport {
                    canonical_name: name.clone(),
                    created: false,
                    changed: false,
                    columns_added: Vec::new(),
                    error: Some(format!("part {name} is not registered")),
                }),
            }
            return Ok(report);
        }

        let mut cursor: Option<String> = None;
        loop {
            let page = self.registry.list(cursor.clone(), RESYNC_PAGE_SIZE).map_err(
                |source| CoordinatorError::Registry {
                    name: "*".to_string(),
                    source,
                },
            )?;
            for entry in &page.items {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return Ok(report);
                }
                report.parts.push(self.sync_part(entry, request.force));
            }
            if page.items.is_empty() || page.next_token.is_none() {
                break;
            }
            cursor = page.next_token;
        }
        Ok(report)
    }

    /// Syncs a single registered part, capturing failures in the report.
    fn sync_part(&self, entry: &RegistryEntry, force: bool) -> PartSyncReport {
        let name = entry.canonical_name.clone();
        let mut report = PartSyncReport {
            canonical_name: name.clone(),
            created: false,
            changed: false,
            columns_added: Vec::new(),
            error: None,
        };
        match self.sync_part_inner(&name, &entry.schema, force) {
            Ok((created, changed, columns_added)) => {
                report.created = created;
                report.changed = changed;
                report.columns_added = columns_added;
            }
            Err(err) => report.error = Some(err.to_string()),
        }
        report
    }

    /// Runs the locked register + provision sequence for one part.
    fn sync_part_inner(
        &self,
        name: &CanonicalName,
        schema: &SchemaDefinition,
        force: bool,
    ) -> Result<(bool, bool, Vec<String>), CoordinatorError> {
        let handle = self.locks.handle(name)?;
        let guard =
            handle.lock().map_err(|_| CoordinatorError::LockPoisoned(name.to_string()))?;
        // Re-registering the stored schema keeps re-sync on the same code
        // path as apply; against an intact registry it is a no-op.
        let outcome = self.registry.register_or_update(name, schema.clone()).map_err(
            |source| CoordinatorError::Registry {
                name: name.to_string(),
                source,
            },
        )?;
        let provision = if force {
            self.provision_with_retry(name, "recreate", || {
                self.provisioner.recreate(name, schema, true)
            })?
        } else {
            self.provision_with_retry(name, "ensure", || {
                self.provisioner.ensure_storage(name, schema)
            })?
        };
        drop(guard);
        Ok((outcome.created, outcome.changed, provision.columns_added))
    }

    /// Runs a provisioning operation, retrying transient failures.
    fn provision_with_retry<F>(
        &self,
        name: &CanonicalName,
        operation: &'static str,
        run: F,
    ) -> Result<ProvisionReport, CoordinatorError>
    where
        F: Fn() -> Result<ProvisionReport, ProvisionError>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1_u32;
        loop {
            match run() {
                Ok(report) => return Ok(report),
                Err(ProvisionError::Transient(_)) if attempt < attempts => {
                    std::thread::sleep(self.retry.delay_before(attempt));
                    attempt += 1;
                }
                Err(source) => {
                    return Err(CoordinatorError::Provisioning {
                        name: name.to_string(),
                        operation,
                        source,
                    });
                }
            }
        }
    }
}
