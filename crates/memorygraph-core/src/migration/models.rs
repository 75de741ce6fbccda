//! Options and result models for backend migration.

use serde::{Deserialize, Serialize};

/// Options for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Validate and export only; skip the import phase
    #[serde(default)]
    pub dry_run: bool,
    /// Report `(current, total)` progress while exporting/importing
    #[serde(default)]
    pub verbose: bool,
    /// Leave memories whose ids already exist in the target untouched
    #[serde(default = "default_true")]
    pub skip_duplicates: bool,
    /// Compare counts and a content sample after the import
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Clear the target when verification fails
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            skip_duplicates: true,
            verify: true,
            rollback_on_failure: true,
        }
    }
}

/// Result of validation checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of post-migration verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub source_count: usize,
    pub target_count: usize,
    pub sample_checks: usize,
    pub sample_passed: usize,
}

/// Result of a migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    #[serde(default)]
    pub dry_run: bool,
    pub source_memory_count: usize,
    pub target_memory_count: usize,
    pub imported_memories: usize,
    pub imported_relationships: usize,
    pub skipped_memories: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
