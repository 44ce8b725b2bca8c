// stageline-core/src/core/procedure.rs
// ============================================================================
// Module: Stageline Procedure Configuration
// Description: Declarative per-part configuration of stages and custom fields.
// Purpose: Parse and bound the JSON form payload that drives schema synthesis.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A procedure configuration describes which production stages apply to a
//! part and which custom checkboxes each stage carries. The payload arrives
//! as a JSON object keyed by stage name and is untrusted: parsing enforces
//! hard size and count limits and fails closed. Stage keys outside the fixed
//! stage vocabulary are accepted and ignored by synthesis so newer form
//! layers can ship stages before this subsystem learns about them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum size of a procedure configuration payload in bytes.
pub const DEFAULT_MAX_PROCEDURE_BYTES: usize = 64 * 1024;
/// Default maximum number of custom checkboxes per stage.
pub const DEFAULT_MAX_CUSTOM_CHECKBOXES: usize = 64;
/// Default maximum length of a custom checkbox name in characters.
pub const DEFAULT_MAX_FIELD_NAME_LENGTH: usize = 64;

/// Parse-time limits applied to procedure configuration payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureLimits {
    /// Maximum payload size in bytes.
    pub max_bytes: usize,
    /// Maximum custom checkboxes per stage.
    pub max_custom_checkboxes: usize,
    /// Maximum checkbox name length in characters.
    pub max_field_name_length: usize,
}

impl Default for ProcedureLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_PROCEDURE_BYTES,
            max_custom_checkboxes: DEFAULT_MAX_CUSTOM_CHECKBOXES,
            max_field_name_length: DEFAULT_MAX_FIELD_NAME_LENGTH,
        }
    }
}

// ============================================================================
// SECTION: Stage Vocabulary
// ============================================================================

/// Fixed, deterministic ordering of known production stages.
///
/// # Invariants
/// - Synthesis walks this list, never input insertion order, so the derived
///   field order is independent of how the configuration was constructed.
pub const STAGE_ORDER: &[&str] = &[
    "kit_verification",
    "smd",
    "assembly",
    "soldering",
    "testing",
    "qc",
    "glueing",
    "packing",
    "dispatch",
];

/// Returns whether a stage name belongs to the fixed stage vocabulary.
#[must_use]
pub fn is_known_stage(name: &str) -> bool {
    STAGE_ORDER.contains(&name)
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Custom checkbox declared for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCheckbox {
    /// Raw checkbox name; sanitized before becoming a field.
    pub name: String,
    /// Human-readable label shown by the forms layer.
    pub label: String,
}

/// Per-stage specification within a procedure configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Whether the stage applies to the part.
    pub enabled: bool,
    /// Form-layer field hints; carried but never synthesized into storage.
    #[serde(default)]
    pub default_fields: Vec<String>,
    /// Custom checkboxes contributing boolean fields when the stage is enabled.
    #[serde(default)]
    pub custom_checkboxes: Vec<CustomCheckbox>,
    /// Optional form-layer rendering mode hint.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Declarative procedure configuration keyed by stage name.
///
/// # Invariants
/// - Stage names are unique map keys; ordering of keys in the source payload
///   carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureConfiguration {
    /// Stage specifications keyed by stage name.
    pub stages: BTreeMap<String, StageSpec>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing a procedure configuration payload.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// Payload exceeds the configured size limit.
    #[error("procedure configuration exceeds size limit: {actual} bytes (max {limit})")]
    PayloadTooLarge {
        /// Observed payload size in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
    /// A stage declares more custom checkboxes than permitted.
    #[error("stage {stage:?} declares {actual} custom checkboxes (max {limit})")]
    TooManyCheckboxes {
        /// Offending stage name.
        stage: String,
        /// Observed checkbox count.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },
    /// A custom checkbox name exceeds the permitted length.
    #[error("stage {stage:?} checkbox name {name:?} exceeds length limit {limit}")]
    FieldNameTooLong {
        /// Offending stage name.
        stage: String,
        /// Offending checkbox name.
        name: String,
        /// Configured limit in characters.
        limit: usize,
    },
    /// Payload is not valid JSON for the expected shape.
    #[error("invalid procedure configuration: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

impl ProcedureConfiguration {
    /// Parses a configuration from a JSON string with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError`] when the payload is too large, malformed,
    /// or exceeds per-stage limits.
    pub fn from_json_str(payload: &str) -> Result<Self, ProcedureError> {
        Self::from_json_str_with_limits(payload, ProcedureLimits::default())
    }

    /// Parses a configuration from a JSON string with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError`] when the payload is too large, malformed,
    /// or exceeds per-stage limits.
    pub fn from_json_str_with_limits(
        payload: &str,
        limits: ProcedureLimits,
    ) -> Result<Self, ProcedureError> {
        if payload.len() > limits.max_bytes {
            return Err(ProcedureError::PayloadTooLarge {
                actual: payload.len(),
                limit: limits.max_bytes,
            });
        }
        let config: Self = serde_json::from_str(payload)
            .map_err(|err| ProcedureError::Parse(err.to_string()))?;
        config.enforce_limits(limits)?;
        Ok(config)
    }

    /// Validates per-stage limits on an already-parsed configuration.
    fn enforce_limits(&self, limits: ProcedureLimits) -> Result<(), ProcedureError> {
        for (stage, spec) in &self.stages {
            if spec.custom_checkboxes.len() > limits.max_custom_checkboxes {
                return Err(ProcedureError::TooManyCheckboxes {
                    stage: stage.clone(),
                    actual: spec.custom_checkboxes.len(),
                    limit: limits.max_custom_checkboxes,
                });
            }
            for checkbox in &spec.custom_checkboxes {
                if checkbox.name.chars().count() > limits.max_field_name_length {
                    return Err(ProcedureError::FieldNameTooLong {
                        stage: stage.clone(),
                        name: checkbox.name.clone(),
                        limit: limits.max_field_name_length,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the stage specification for a known stage name, if present.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.get(name)
    }
}
