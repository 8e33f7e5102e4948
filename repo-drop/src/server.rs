//! # Upload server
//!
//! HTTP front end of the synchronisation engine:
//!
//! - `GET /health` answers `{"status":"ok"}`
//! - `POST /upload` accepts one multipart batch (`files` parts plus the text fields
//!   `filePaths`, `repoUrl`, `token`, `branch`, `commitMessage`), spools every file
//!   part to a temporary file and hands the batch to [`synchronise`]
//!
//! Intake limits (bytes per file, files per request) are enforced while the body is
//! streamed, so an oversize part never lands on disk in full. `filePaths` values are
//! matched to `files` parts by position; a missing or blank entry falls back to the
//! part's original file name.
//!
//! The response is 200 when at least one file was written and 500 when none was;
//! request-shape problems are rejected with 400 before any remote call.
//!
//! Only intake is time-boxed. Once the form is read, the batch runs on its own task
//! and always completes, so every attempted write is reported.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use repo_drop_core::contract::{Credential, RemoteStore};
use repo_drop_core::record::FileRecord;
use repo_drop_core::synchronise::{synchronise, SyncRequest};
use repo_drop_core::target::RepositoryTarget;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::api::{
    UploadResponse, FIELD_BRANCH, FIELD_COMMIT_MESSAGE, FIELD_FILES, FIELD_FILE_PATHS,
    FIELD_REPO_URL, FIELD_TOKEN,
};
use crate::error::AppError;
use crate::github::GitHubClient;
use crate::load_config::{AppConfig, LimitsSection};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub limits: LimitsSection,
    pub spool_dir: Option<PathBuf>,
    /// Ceiling for receiving one multipart body.
    pub intake_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<()> {
    let store = GitHubClient::new(&config.github.api_base_url, &config.github.user_agent)
        .context("Failed to construct GitHub client")?;
    let state = AppState {
        store: Arc::new(store),
        limits: config.limits.clone(),
        spool_dir: config.spool_dir.clone(),
        intake_timeout: Duration::from_secs(config.server.request_timeout_secs),
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(%addr, "Upload server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Upload server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = ?e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Parsed multipart form; spooled files are deleted if the request is abandoned.
#[derive(Default)]
struct UploadForm {
    files: Vec<(Option<String>, NamedTempFile)>,
    file_paths: Vec<String>,
    repo_url: Option<String>,
    token: Option<String>,
    branch: Option<String>,
    commit_message: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = tokio::time::timeout(state.intake_timeout, read_form(&state, multipart))
        .await
        .map_err(|_| AppError::IntakeTimeout(state.intake_timeout.as_secs()))??;

    let (repo_url, token) = match (&form.repo_url, &form.token) {
        (Some(url), Some(token))
            if !url.trim().is_empty() && !token.trim().is_empty() && !form.files.is_empty() =>
        {
            (url.clone(), token.clone())
        }
        _ => return Err(AppError::MissingFields),
    };
    let target = RepositoryTarget::parse(&repo_url, form.branch.as_deref())?;

    let mut items = Vec::with_capacity(form.files.len());
    for (index, (name, file)) in form.files.into_iter().enumerate() {
        let path = form
            .file_paths
            .get(index)
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .or(name)
            .unwrap_or_default();
        items.push(FileRecord::spooled(path, file)?);
    }
    info!(%target, files = items.len(), "Received upload batch");

    let request = SyncRequest {
        target,
        credential: Credential::new(token),
        commit_message: form.commit_message,
        items,
    };
    let store = state.store.clone();
    // Detached from the connection: a dropped request must not cut the batch short.
    let result = tokio::spawn(async move { synchronise(store.as_ref(), request).await })
        .await
        .map_err(|e| AppError::Aborted(e.to_string()))??;

    let status = if result.overall_success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(UploadResponse::from(&result))))
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            FIELD_FILES => {
                if form.files.len() >= state.limits.max_files {
                    return Err(AppError::TooManyFiles(state.limits.max_files));
                }
                let original_name = field.file_name().map(str::to_owned);
                let file = spool_field(state, field).await?;
                form.files.push((original_name, file));
            }
            FIELD_FILE_PATHS => form.file_paths.push(text(field).await?),
            FIELD_REPO_URL => form.repo_url = Some(text(field).await?),
            FIELD_TOKEN => form.token = Some(text(field).await?),
            FIELD_BRANCH => form.branch = Some(text(field).await?),
            FIELD_COMMIT_MESSAGE => form.commit_message = Some(text(field).await?),
            other => warn!(field = other, "Ignoring unknown multipart field"),
        }
    }
    Ok(form)
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Multipart(e.body_text()))
}

/// Streams one file part to a temporary file, enforcing the per-file limit.
async fn spool_field(state: &AppState, mut field: Field<'_>) -> Result<NamedTempFile, AppError> {
    let file = match &state.spool_dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };
    let mut out = tokio::fs::File::from_std(file.reopen()?);
    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Multipart(e.body_text()))?
    {
        written += chunk.len() as u64;
        if written > state.limits.max_file_size {
            return Err(AppError::FileTooLarge(state.limits.max_file_size));
        }
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(file)
}
