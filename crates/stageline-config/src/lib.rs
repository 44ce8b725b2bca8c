// stageline-config/src/lib.rs
// ============================================================================
// Module: Stageline Config Library
// Description: Canonical config model and validation for Stageline.
// Purpose: Single source of truth for stageline.toml semantics.
// Dependencies: stageline-core, stageline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `stageline-config` defines the canonical configuration model for
//! Stageline. It provides strict, fail-closed parsing of `stageline.toml`
//! with hard size and path limits, plus a deterministic example generator
//! kept in sync with the model.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
