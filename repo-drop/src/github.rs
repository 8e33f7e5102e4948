//! # GitHub contents API client
//!
//! Implements the core [`RemoteStore`] contract over the REST contents endpoint
//! (`/repos/{owner}/{repo}/contents/{path}`):
//!
//! - `file_state` issues a `GET` with `ref=<branch>` and reads the blob `sha`
//! - `put_file` issues a `PUT` that creates or updates the file in one commit,
//!   carrying the `sha` only when the file already exists
//!
//! The credential travels with every call, so one client (and its connection pool)
//! serves every upload request regardless of whose token it carries.
//!
//! A 404 maps to [`RemoteError::NotFound`]; any other non-success status maps to
//! [`RemoteError::Api`] with the `message` field of GitHub's JSON error body.

use async_trait::async_trait;
use repo_drop_core::contract::{
    Credential, PutFileRequest, RemoteError, RemoteFileState, RemoteStore, StoredFile,
};
use repo_drop_core::target::RepositoryTarget;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    http: Client,
    api_base_url: String,
}

#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Debug, Default, Deserialize)]
struct PutContentsResponse {
    #[serde(default)]
    content: Option<ContentsEntry>,
    #[serde(default)]
    commit: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(api_base_url: &str, user_agent: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(user_agent).build()?;
        tracing::info!(api_base_url, user_agent, "Initialized GitHub contents client");
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn contents_url(&self, target: &RepositoryTarget, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base_url,
            urlencoding::encode(&target.owner),
            urlencoding::encode(&target.repo),
            encoded_path
        )
    }

    fn authorised(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder
            .bearer_auth(credential.expose())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl RemoteStore for GitHubClient {
    async fn file_state(
        &self,
        credential: &Credential,
        target: &RepositoryTarget,
        path: &str,
    ) -> Result<RemoteFileState, RemoteError> {
        let url = self.contents_url(target, path);
        tracing::debug!(%url, branch = %target.branch, "Probing GitHub contents");

        let response = self
            .authorised(self.http.get(&url), credential)
            .query(&[("ref", target.branch.as_str())])
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let body: serde_json::Value = response.json().await.map_err(transport)?;
        if body.is_array() {
            return Err(RemoteError::Api {
                status: StatusCode::OK.as_u16(),
                message: format!("{path} is a directory in the repository"),
            });
        }
        let entry: ContentsEntry = serde_json::from_value(body).map_err(|e| RemoteError::Api {
            status: StatusCode::OK.as_u16(),
            message: format!("unexpected contents response: {e}"),
        })?;
        Ok(RemoteFileState::Present {
            version_token: entry.sha,
        })
    }

    async fn put_file(
        &self,
        credential: &Credential,
        target: &RepositoryTarget,
        request: PutFileRequest,
    ) -> Result<StoredFile, RemoteError> {
        let url = self.contents_url(target, &request.path);
        let body = PutContentsBody {
            message: &request.message,
            content: &request.content_base64,
            branch: &request.branch,
            sha: request.version_token.as_deref(),
        };
        tracing::debug!(%url, branch = %request.branch, update = body.sha.is_some(), "Writing GitHub contents");

        let response = self
            .authorised(self.http.put(&url), credential)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let written = match response.text().await {
            Ok(text) => parse_put_response(&request.path, &text),
            Err(e) => {
                tracing::warn!(error = %e, path = %request.path, "Failed to read GitHub write response; version token unknown");
                PutContentsResponse::default()
            }
        };
        Ok(StoredFile {
            path: request.path,
            version_token: written.content.map(|c| c.sha),
            commit_sha: written.commit.map(|c| c.sha),
        })
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    let text = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: error_message(status, &text),
    })
}

/// The write already succeeded; an unreadable body only loses the returned shas.
fn parse_put_response(path: &str, body: &str) -> PutContentsResponse {
    match serde_json::from_str(body) {
        Ok(written) => written,
        Err(e) => {
            tracing::warn!(error = %e, path, "Unreadable GitHub write response; version token unknown");
            PutContentsResponse::default()
        }
    }
}

/// GitHub's `message` field when present, else the status line.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("GitHub API responded with {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RepositoryTarget {
        RepositoryTarget::parse("https://github.com/octo/site", Some("gh-pages")).unwrap()
    }

    #[test]
    fn contents_url_encodes_each_segment_but_keeps_slashes() {
        let client = GitHubClient::new("https://api.github.com/", "repo-drop-test").unwrap();
        assert_eq!(
            client.contents_url(&target(), "docs/my notes/a#1.md"),
            "https://api.github.com/repos/octo/site/contents/docs/my%20notes/a%231.md"
        );
    }

    #[test]
    fn put_body_only_carries_sha_for_updates() {
        let create = PutContentsBody {
            message: "Upload a.txt",
            content: "YQ==",
            branch: "main",
            sha: None,
        };
        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            serde_json::json!({"message": "Upload a.txt", "content": "YQ==", "branch": "main"})
        );

        let update = PutContentsBody { sha: Some("abc"), ..create };
        assert_eq!(serde_json::to_value(&update).unwrap()["sha"], "abc");
    }

    #[test]
    fn put_response_yields_blob_and_commit_sha() {
        let written = parse_put_response(
            "a.txt",
            r#"{"content":{"path":"a.txt","sha":"blob1"},"commit":{"sha":"c0ffee"}}"#,
        );
        assert_eq!(written.content.map(|c| c.sha).as_deref(), Some("blob1"));
        assert_eq!(written.commit.map(|c| c.sha).as_deref(), Some("c0ffee"));
    }

    #[test]
    fn unreadable_put_response_falls_back_to_unknown_shas() {
        let written = parse_put_response("a.txt", "<html>bad gateway</html>");
        assert!(written.content.is_none());
        assert!(written.commit.is_none());
    }

    #[test]
    fn error_message_prefers_github_message() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"message":"is at abc but expected def"}"#),
            "is at abc but expected def"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "GitHub API responded with 502 Bad Gateway"
        );
    }
}
