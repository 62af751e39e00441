// SPDX-License-Identifier: MIT OR Apache-2.0
//! Push Orchestrator (spec.md §4.9/§4.10 C10).
//!
//! Walks one push event through
//! `resolve creds -> fetch snapshot -> parse pipeline -> persist job ->
//! mark pending -> execute -> finalise status -> cleanup`. Every exit path,
//! success or failure, removes the extracted snapshot directory and — once
//! a token is known — leaves exactly one terminal commit status posted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{JobExecutor, SnapshotSource, StatusReporter};

use octorunner_auth::{CredentialProvider, CredentialStore};
use octorunner_core::{EventScope, JobStatus, PushEvent, Repository};
use octorunner_forge::StatusState;
use octorunner_pipeline::PipelineError;
use octorunner_snapshot::{Snapshot, SnapshotError};
use octorunner_store::{Store, StoreError};
use std::sync::Arc;

/// Errors raised while driving a push event through the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No token could be resolved for the repository; no status can be
    /// posted either, since posting itself requires the same token.
    #[error("no credentials configured for {0}")]
    CredentialsMissing(String),
    /// Acquiring the source snapshot failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Locating or parsing the pipeline file failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A persistence operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Container execution failed.
    #[error(transparent)]
    Executor(#[from] octorunner_executor::ExecutorError),
}

impl OrchestratorError {
    /// Classify this error per spec.md §7.
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        match self {
            OrchestratorError::CredentialsMissing(_) => octorunner_core::ErrorKind::CredentialsMissing,
            OrchestratorError::Snapshot(e) => e.kind(),
            OrchestratorError::Pipeline(e) => e.kind(),
            OrchestratorError::Store(e) => e.kind(),
            OrchestratorError::Executor(e) => e.kind(),
        }
    }
}

/// Ties together every collaborator the push pipeline needs for one forge.
///
/// `credentials`, `snapshot_fetcher`, `forge_client`, and `executor` are all
/// held as trait objects (spec.md §8/§9) so orchestrator-level tests can
/// supply fakes for each without a Docker daemon, network access, or a
/// populated config file, while production code still passes in the real
/// `octorunner-auth`/`-snapshot`/`-forge`/`-executor` types unchanged.
#[derive(Clone)]
pub struct PushOrchestrator {
    credentials: Arc<dyn CredentialProvider>,
    snapshot_fetcher: Arc<dyn SnapshotSource>,
    store: Store,
    forge_client: Arc<dyn StatusReporter>,
    executor: Arc<dyn JobExecutor>,
}

impl PushOrchestrator {
    /// Wire up one orchestrator instance from its collaborators.
    #[must_use]
    pub fn new(
        credentials: impl CredentialProvider + 'static,
        snapshot_fetcher: impl SnapshotSource + 'static,
        store: Store,
        forge_client: impl StatusReporter + 'static,
        executor: impl JobExecutor + 'static,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            snapshot_fetcher: Arc::new(snapshot_fetcher),
            store,
            forge_client: Arc::new(forge_client),
            executor: Arc::new(executor),
        }
    }

    /// Drive one validated push event through the full pipeline.
    ///
    /// Returns `Ok(())` both when the run completes (any exit code) and
    /// when the sentinel all-zero commit short-circuits processing
    /// (spec.md §4.10). Every other failure is reported as
    /// [`OrchestratorError`] after a best-effort `error` status post.
    pub async fn handle_push(
        &self,
        event: &PushEvent,
        scope: &EventScope,
    ) -> Result<(), OrchestratorError> {
        if event.is_sentinel() {
            tracing::info!(
                full_name = %event.repository.full_name,
                "sentinel commit id, skipping (branch delete or no-op merge)"
            );
            return Ok(());
        }

        let repo = &event.repository;
        let commit = event.after.as_str();

        let Some((token, source)) = self.credentials.lookup_token(&repo.full_name) else {
            tracing::error!(full_name = %repo.full_name, "no credentials configured, cannot process or report status");
            return Err(OrchestratorError::CredentialsMissing(repo.full_name.clone()));
        };
        tracing::debug!(full_name = %repo.full_name, ?source, "resolved repository token");

        let snapshot = match self
            .snapshot_fetcher
            .fetch(&repo.owner.name, &repo.name, commit, Some(&token), scope)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, full_name = %repo.full_name, "snapshot fetch failed");
                self.post_status_best_effort(repo, commit, StatusState::Error, &token)
                    .await;
                return Err(OrchestratorError::Snapshot(e));
            }
        };

        let result = self.run_in_snapshot(repo, commit, &token, &snapshot, scope).await;

        if let Err(e) = tokio::fs::remove_dir_all(&snapshot.temp_root).await {
            tracing::warn!(error = %e, path = %snapshot.temp_root.display(), "failed to remove snapshot directory");
        }

        if let Err(e) = &result {
            tracing::error!(error = %e, full_name = %repo.full_name, "push processing failed");
            self.post_status_best_effort(repo, commit, StatusState::Error, &token)
                .await;
        }

        result
    }

    async fn run_in_snapshot(
        &self,
        repo: &Repository,
        commit: &str,
        token: &str,
        snapshot: &Snapshot,
        scope: &EventScope,
    ) -> Result<(), OrchestratorError> {
        let pipeline = octorunner_pipeline::load_pipeline(&snapshot.workdir)?;

        let project = self
            .store
            .find_or_create_project(&repo.name, &repo.owner.name)
            .await?;
        let job = self.store.create_job(project.id, commit, "default").await?;

        self.post_status_best_effort(repo, commit, StatusState::Pending, token)
            .await;

        let writer = self.store.make_output_writer(job.id);
        let outcome = self
            .executor
            .run(&pipeline, &snapshot.workdir, &repo.full_name, commit, &writer, scope)
            .await;

        match outcome {
            Ok(outcome) => {
                let state = status_for_exit_code(outcome.exit_code);
                let extra = format!("exit code {}", outcome.exit_code);
                if let Err(e) = self.store.update_job_status(job.id, JobStatus::Done, &extra).await {
                    tracing::error!(error = %e, job_id = job.id, "failed to record terminal job status");
                }
                self.post_status_best_effort(repo, commit, state, token).await;
                Ok(())
            }
            Err(e) => {
                if let Err(store_err) = self
                    .store
                    .update_job_status(job.id, JobStatus::Error, &e.to_string())
                    .await
                {
                    tracing::error!(error = %store_err, job_id = job.id, "failed to record job error status");
                }
                Err(OrchestratorError::Executor(e))
            }
        }
    }

    /// Post a commit status, logging and swallowing any failure — posting
    /// a status is never allowed to fail the run it's reporting on
    /// (spec.md §7 `StatusPost` is always non-fatal).
    async fn post_status_best_effort(
        &self,
        repo: &Repository,
        commit: &str,
        state: StatusState,
        token: &str,
    ) {
        if let Err(e) = self
            .forge_client
            .post_status(&repo.owner.name, &repo.name, commit, state, token)
            .await
        {
            tracing::warn!(error = %e, full_name = %repo.full_name, ?state, "failed to post commit status");
        }
    }
}

/// Map a container exit code to the terminal commit status (spec.md §4.8):
/// zero is success, anything else is failure.
#[must_use]
fn status_for_exit_code(exit_code: i64) -> StatusState {
    if exit_code == 0 {
        StatusState::Success
    } else {
        StatusState::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octorunner_core::{RepositoryOwner, ZERO_COMMIT};
    use octorunner_executor::ContainerExecutor;
    use octorunner_forge::ForgeClient;
    use octorunner_snapshot::SnapshotFetcher;

    #[test]
    fn zero_exit_is_success() {
        assert_eq!(status_for_exit_code(0), StatusState::Success);
    }

    #[test]
    fn nonzero_exit_is_failure() {
        assert_eq!(status_for_exit_code(1), StatusState::Failure);
        assert_eq!(status_for_exit_code(127), StatusState::Failure);
    }

    #[tokio::test]
    async fn sentinel_commit_short_circuits_without_credentials() {
        let orchestrator = test_orchestrator();
        let event = PushEvent {
            after: ZERO_COMMIT.to_string(),
            repository: sample_repo(),
        };
        let scope = EventScope::new();
        orchestrator
            .handle_push(&event, &scope)
            .await
            .expect("sentinel short circuits cleanly");
    }

    #[tokio::test]
    async fn missing_credentials_is_reported_without_panicking() {
        let orchestrator = test_orchestrator();
        let event = PushEvent {
            after: "abc123".to_string(),
            repository: sample_repo(),
        };
        let scope = EventScope::new();
        let err = orchestrator.handle_push(&event, &scope).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::CredentialsMissing(_)));
        assert_eq!(err.kind(), octorunner_core::ErrorKind::CredentialsMissing);
    }

    fn sample_repo() -> Repository {
        Repository {
            name: "proj".into(),
            full_name: "alice/proj".into(),
            private: false,
            owner: RepositoryOwner { name: "alice".into() },
        }
    }

    fn test_orchestrator() -> PushOrchestrator {
        let credentials = CredentialStore::new(octorunner_config::RunnerConfig::default());
        let snapshot_fetcher = SnapshotFetcher::new("https://example.invalid", "https://api.example.invalid")
            .expect("client");
        let store = Store::open_in_memory().expect("store");
        let forge_client = ForgeClient::new("https://api.example.invalid").expect("forge client");
        let executor = ContainerExecutor::new(
            bollard::Docker::connect_with_local_defaults().expect("docker handle"),
        );
        PushOrchestrator::new(credentials, snapshot_fetcher, store, forge_client, executor)
    }
}
