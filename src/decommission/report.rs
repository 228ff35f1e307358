use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetCategory, AssetRef};
use crate::error::{DecomError, ErrorCode};

/// What happened to one planned asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssetOutcome {
    Deleted,
    Failed { code: ErrorCode, detail: String },
    /// The run halted or was stopped before this asset was reached.
    NotAttempted,
}

impl AssetOutcome {
    pub fn failed(error: &DecomError) -> Self {
        AssetOutcome::Failed {
            code: error.code(),
            detail: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAsset {
    pub id: String,
    pub name: String,
    pub code: ErrorCode,
    pub detail: String,
}

/// Per-category outcome of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub category: AssetCategory,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedAsset>,
    pub not_attempted: Vec<String>,
}

impl DeletionResult {
    pub fn new(category: AssetCategory) -> Self {
        Self {
            category,
            succeeded: Vec::new(),
            failed: Vec::new(),
            not_attempted: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, asset: &Asset, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::Deleted => self.succeeded.push(asset.id.clone()),
            AssetOutcome::Failed { code, detail } => self.failed.push(FailedAsset {
                id: asset.id.clone(),
                name: asset.display_name().to_string(),
                code: *code,
                detail: detail.clone(),
            }),
            AssetOutcome::NotAttempted => self.not_attempted.push(asset.id.clone()),
        }
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }
}

/// Why the executor stopped starting new deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halt {
    pub code: ErrorCode,
    pub detail: String,
}

/// Aggregate outcome of a decommission run. Partial completion is a valid
/// terminal state and is reported as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecommissionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<DeletionResult>,
    /// Selected assets that have no remote delete.
    pub manual: Vec<AssetRef>,
    /// Set when an expired key or session stopped the run.
    pub halted: Option<Halt>,
    /// Set when the caller asked the run to stop.
    pub stopped: bool,
}

impl DecommissionReport {
    pub fn result(&self, category: AssetCategory) -> Option<&DeletionResult> {
        self.results.iter().find(|r| r.category == category)
    }

    pub fn attempted(&self) -> usize {
        self.results.iter().map(DeletionResult::attempted).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().map(|r| r.succeeded.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().map(|r| r.failed.len()).sum()
    }

    pub fn not_attempted(&self) -> usize {
        self.results.iter().map(|r| r.not_attempted.len()).sum()
    }

    /// Every planned asset was deleted.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(DeletionResult::is_complete)
    }
}
