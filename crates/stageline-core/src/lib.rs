// stageline-core/src/lib.rs
// ============================================================================
// Module: Stageline Core Library
// Description: Public API surface for the Stageline core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Stageline core derives per-part data schemas from manufacturing procedure
//! configurations and keeps backing storage reconciled with them. It is
//! backend-agnostic and integrates through explicit registry, provisioner,
//! and repository interfaces rather than embedding a storage engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::EntryError;
pub use interfaces::EntryRepository;
pub use interfaces::ProvisionError;
pub use interfaces::ProvisionReport;
pub use interfaces::RegistryError;
pub use interfaces::SchemaRegistry;
pub use interfaces::StorageProvisioner;
pub use runtime::ApplyReport;
pub use runtime::CancelFlag;
pub use runtime::CoordinatorError;
pub use runtime::InMemorySchemaRegistry;
pub use runtime::InMemoryStorageEngine;
pub use runtime::PartSyncReport;
pub use runtime::ProcedureCoordinator;
pub use runtime::ResyncReport;
pub use runtime::ResyncRequest;
pub use runtime::RetryPolicy;
