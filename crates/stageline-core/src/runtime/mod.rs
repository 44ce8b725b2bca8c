// stageline-core/src/runtime/mod.rs
// ============================================================================
// Module: Stageline Runtime
// Description: Procedure coordinator and in-memory backend implementations.
// Purpose: Drive the schema lifecycle against pluggable backends.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the two-phase procedure workflow and the
//! in-memory backends used by tests and demos. All outer surfaces must call
//! through the coordinator so per-part ordering guarantees hold.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod coordinator;
pub mod memory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use coordinator::ApplyReport;
pub use coordinator::CancelFlag;
pub use coordinator::CoordinatorError;
pub use coordinator::PartSyncReport;
pub use coordinator::ProcedureCoordinator;
pub use coordinator::ResyncReport;
pub use coordinator::ResyncRequest;
pub use coordinator::RetryPolicy;
pub use memory::InMemorySchemaRegistry;
pub use memory::InMemoryStorageEngine;
