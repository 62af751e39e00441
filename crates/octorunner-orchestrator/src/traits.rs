// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collaborator traits [`PushOrchestrator`](crate::PushOrchestrator) drives
//! through, rather than owning the concrete `octorunner-snapshot`,
//! `-forge`, and `-executor` types directly.
//!
//! Grounded on `abp-backend-core::Backend`: an `#[async_trait]` interface
//! at the seam between the orchestrator and the systems it calls out to,
//! so integration tests can drive the real state machine against fakes
//! (`abp-integrations::MockBackend`'s role here) the way spec.md §8 asks
//! for, without a Docker daemon or network access.

use async_trait::async_trait;
use octorunner_core::EventScope;
use octorunner_executor::{ContainerExecutor, ExecutionOutcome, ExecutorError};
use octorunner_forge::{ForgeClient, ForgeError, StatusState};
use octorunner_pipeline::PipelineSpec;
use octorunner_snapshot::{Snapshot, SnapshotError, SnapshotFetcher};
use octorunner_store::OutputWriter;
use std::path::Path;

/// Resolves and extracts a source snapshot for one commit.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch and extract the archive for `owner/repo` at `commit`.
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        token: Option<&str>,
        scope: &EventScope,
    ) -> Result<Snapshot, SnapshotError>;
}

#[async_trait]
impl SnapshotSource for SnapshotFetcher {
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        token: Option<&str>,
        scope: &EventScope,
    ) -> Result<Snapshot, SnapshotError> {
        SnapshotFetcher::fetch(self, owner, repo, commit, token, scope).await
    }
}

/// Publishes a commit status to the forge.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Post `state` as the commit status for `owner/repo@commit`.
    async fn post_status(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        state: StatusState,
        token: &str,
    ) -> Result<(), ForgeError>;
}

#[async_trait]
impl StatusReporter for ForgeClient {
    async fn post_status(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        state: StatusState,
        token: &str,
    ) -> Result<(), ForgeError> {
        ForgeClient::post_status(self, owner, repo, commit, state, token).await
    }
}

/// Runs one pipeline to completion inside a container.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute `pipeline` against the extracted `workdir`.
    async fn run(
        &self,
        pipeline: &PipelineSpec,
        workdir: &Path,
        full_name: &str,
        commit_id: &str,
        writer: &OutputWriter,
        scope: &EventScope,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

#[async_trait]
impl JobExecutor for ContainerExecutor {
    async fn run(
        &self,
        pipeline: &PipelineSpec,
        workdir: &Path,
        full_name: &str,
        commit_id: &str,
        writer: &OutputWriter,
        scope: &EventScope,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        ContainerExecutor::run(self, pipeline, workdir, full_name, commit_id, writer, scope).await
    }
}
