//! Wire format shared by the upload server and the submission client.

use repo_drop_core::aggregate::BatchResult;
use serde::{Deserialize, Serialize};

pub const FIELD_FILES: &str = "files";
pub const FIELD_FILE_PATHS: &str = "filePaths";
pub const FIELD_REPO_URL: &str = "repoUrl";
pub const FIELD_TOKEN: &str = "token";
pub const FIELD_BRANCH: &str = "branch";
pub const FIELD_COMMIT_MESSAGE: &str = "commitMessage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FileError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

impl UploadResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            uploaded_files: None,
            errors: None,
        }
    }
}

impl From<&BatchResult> for UploadResponse {
    fn from(result: &BatchResult) -> Self {
        let errors: Vec<FileError> = result
            .failures
            .iter()
            .map(|f| FileError {
                file: f.path.clone(),
                error: f.message.clone(),
            })
            .collect();

        if result.overall_success {
            Self {
                success: true,
                message: result.summary_message(),
                uploaded_files: Some(result.succeeded.clone()),
                errors: (!errors.is_empty()).then_some(errors),
            }
        } else {
            Self {
                success: false,
                message: result.summary_message(),
                uploaded_files: None,
                errors: Some(errors),
            }
        }
    }
}
