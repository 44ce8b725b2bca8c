// stageline-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Part Store
// Description: Durable registry, provisioner, and repository using SQLite WAL.
// Purpose: Provide production-grade persistence for Stageline schemas and entries.
// Dependencies: stageline-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed implementation of the Stageline
//! backend interfaces: the schema registry persists canonical schema
//! definitions with verified hashes, the provisioner reconciles one physical
//! table per part against its registered schema, and the repository reads
//! and writes entry rows. Registrations survive process restarts, so the
//! registry can be rebuilt after a crash without re-submitting procedures.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_SCHEMA_BYTES;
pub use store::SqliteDbErrorCounts;
pub use store::SqliteOpCounts;
pub use store::SqlitePartStore;
pub use store::SqlitePerfStatsSnapshot;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
