//! Folds per-item outcomes into one batch result.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success(String),
    Failure { path: String, message: String },
}

impl UploadOutcome {
    pub fn failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        UploadOutcome::Failure {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            UploadOutcome::Success(path) | UploadOutcome::Failure { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    FullySucceeded,
    PartiallySucceeded,
    FullyFailed,
}

/// Outcome of a whole batch.
///
/// `overall_success` is true as soon as one item succeeded, even when others
/// failed; check `failures` separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub overall_success: bool,
    pub succeeded: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = UploadOutcome>) -> Self {
        let mut result = BatchResult::default();
        for outcome in outcomes {
            match outcome {
                UploadOutcome::Success(path) => result.succeeded.push(path),
                UploadOutcome::Failure { path, message } => {
                    result.failures.push(ItemFailure { path, message })
                }
            }
        }
        result.overall_success = !result.succeeded.is_empty();
        result
    }

    pub fn status(&self) -> BatchStatus {
        match (self.succeeded.is_empty(), self.failures.is_empty()) {
            (true, _) => BatchStatus::FullyFailed,
            (false, true) => BatchStatus::FullySucceeded,
            (false, false) => BatchStatus::PartiallySucceeded,
        }
    }

    pub fn summary_message(&self) -> String {
        match self.status() {
            BatchStatus::FullyFailed => "Failed to upload all files".to_owned(),
            BatchStatus::FullySucceeded => {
                format!("Uploaded {} file(s)", self.succeeded.len())
            }
            BatchStatus::PartiallySucceeded => format!(
                "Uploaded {} file(s), {} failed",
                self.succeeded.len(),
                self.failures.len()
            ),
        }
    }
}

impl FromIterator<UploadOutcome> for BatchResult {
    fn from_iter<I: IntoIterator<Item = UploadOutcome>>(iter: I) -> Self {
        Self::from_outcomes(iter)
    }
}
