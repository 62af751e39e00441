// SPDX-License-Identifier: MIT OR Apache-2.0
//! Forge API client: commit status publishing (spec.md §4.8 C8).
//!
//! Sends the same `reqwest::Client::builder().timeout(...)` + `.post(url)` +
//! `error_for_status` shape `shipper_webhook::send_webhook_async` uses, bent
//! to the forge's commit-status endpoint instead of a generic payload POST.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use octorunner_core::STATUS_CONTEXT;
use serde::Serialize;
use std::time::Duration;

/// Commit status states, in the order the orchestrator moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// Posted before container execution begins.
    Pending,
    /// Posted after a zero exit code.
    Success,
    /// Posted after a non-zero exit code.
    Failure,
    /// Posted when an orchestrator-level error prevents execution from
    /// completing.
    Error,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    state: StatusState,
    context: &'a str,
}

/// Errors raised while posting a commit status.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// The HTTP request itself failed (network, TLS, timeout).
    #[error("forge request failed: {0}")]
    Request(String),
    /// The forge responded with a non-2xx status.
    #[error("forge rejected status post: {0}")]
    Rejected(String),
}

impl ForgeError {
    /// Every [`ForgeError`] classifies as spec.md §7's `StatusPost`, which
    /// the orchestrator treats as non-fatal.
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        octorunner_core::ErrorKind::StatusPost
    }
}

/// Posts commit statuses and resolves archive download authentication
/// (bearer token attached per request, not held on the client).
#[derive(Debug, Clone)]
pub struct ForgeClient {
    client: reqwest::Client,
    api_base: String,
}

impl ForgeClient {
    /// Build a client pointed at `api_base` (e.g. `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Request`] if the HTTP client cannot be built.
    pub fn new(api_base: &str) -> Result<Self, ForgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ForgeError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.to_string(),
        })
    }

    /// Post a commit status for `(owner, repo, commit)` under
    /// [`STATUS_CONTEXT`], authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] if the request fails or the forge rejects it.
    /// Callers (the orchestrator) treat this as non-fatal per spec.md §7.
    pub async fn post_status(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        state: StatusState,
        token: &str,
    ) -> Result<(), ForgeError> {
        let url = format!("{}/repos/{owner}/{repo}/statuses/{commit}", self.api_base);
        let body = StatusBody {
            state,
            context: STATUS_CONTEXT,
        };

        tracing::debug!(%owner, %repo, %commit, ?state, "posting commit status");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("User-Agent", "octorunner")
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ForgeError::Rejected(format!("{status}: {text}")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_status_with_expected_body_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/alice/proj/statuses/abc123"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({
                "state": "pending",
                "context": STATUS_CONTEXT,
            })))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = ForgeClient::new(&server.uri()).expect("client");
        client
            .post_status("alice", "proj", "abc123", StatusState::Pending, "tok")
            .await
            .expect("post");
    }

    #[tokio::test]
    async fn non_2xx_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/alice/proj/statuses/abc123"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = ForgeClient::new(&server.uri()).expect("client");
        let err = client
            .post_status("alice", "proj", "abc123", StatusState::Success, "tok")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Rejected(_)));
    }
}
