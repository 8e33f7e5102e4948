//! Client side of the upload API: packs a collected batch into one multipart
//! request and reads back the server's verdict.

use anyhow::{Context, Result};
use repo_drop_core::collector::BatchItem;
use repo_drop_core::contract::Credential;
use reqwest::multipart::{Form, Part};

use crate::api::{
    UploadResponse, FIELD_BRANCH, FIELD_COMMIT_MESSAGE, FIELD_FILES, FIELD_FILE_PATHS,
    FIELD_REPO_URL, FIELD_TOKEN,
};

#[derive(Debug, Clone)]
pub struct Submission {
    /// Base URL of a running upload server, e.g. `http://localhost:5000`.
    pub server_url: String,
    pub repo_url: String,
    pub token: Credential,
    pub branch: Option<String>,
    pub commit_message: Option<String>,
}

impl Submission {
    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.server_url.trim_end_matches('/'))
    }
}

/// Builds the multipart form: one `files` part and one `filePaths` value per item,
/// in the same order.
pub async fn build_form(submission: &Submission, items: &[BatchItem]) -> Result<Form> {
    let mut form = Form::new()
        .text(FIELD_REPO_URL, submission.repo_url.clone())
        .text(FIELD_TOKEN, submission.token.expose().to_owned());
    if let Some(branch) = submission.branch.as_ref().filter(|b| !b.trim().is_empty()) {
        form = form.text(FIELD_BRANCH, branch.clone());
    }
    if let Some(message) = submission
        .commit_message
        .as_ref()
        .filter(|m| !m.trim().is_empty())
    {
        form = form.text(FIELD_COMMIT_MESSAGE, message.clone());
    }

    for item in items {
        let path = item.record.relative_path();
        let bytes = item
            .record
            .content()
            .bytes()
            .await
            .with_context(|| format!("Failed to read {path}"))?
            .into_owned();
        let file_name = path.rsplit('/').next().unwrap_or(path).to_owned();
        form = form
            .part(FIELD_FILES, Part::bytes(bytes).file_name(file_name))
            .text(FIELD_FILE_PATHS, path.to_owned());
    }
    Ok(form)
}

/// Sends the batch and returns the parsed response for both 200 and 500 verdicts.
pub async fn submit(
    client: &reqwest::Client,
    submission: &Submission,
    items: &[BatchItem],
) -> Result<UploadResponse> {
    let url = submission.upload_url();
    let form = build_form(submission, items).await?;
    tracing::info!(%url, files = items.len(), "Submitting upload batch");

    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("Failed to reach upload server at {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read upload server response")?;

    serde_json::from_str::<UploadResponse>(&body).with_context(|| {
        format!("Upload server responded with {status} and an unreadable body: {body}")
    })
}
