// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted entities: [`Project`], [`Job`], [`OutputLine`].
//!
//! See spec.md §3 for the invariants these types carry; this module only
//! defines shapes, not persistence — that's [`octorunner_store`](../octorunner_store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source repository tracked by octorunner, unique by `(name, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Auto-assigned, monotonic, positive identifier.
    pub id: i64,
    /// Repository name (without owner).
    pub name: String,
    /// Repository owner (user or org login).
    pub owner: String,
}

/// Lifecycle status of a [`Job`].
///
/// Transitions are `Running -> {Done | Error}` exactly once; there is no
/// reverse transition (spec.md §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The container has been created and the pipeline has not finished yet.
    Running,
    /// The pipeline ran to completion (exit code may be zero or non-zero —
    /// see spec.md §9's open question on whether a non-zero exit should be
    /// `Done` or `Error`; this implementation keeps `Done`, matching the
    /// status quo the open question describes).
    Done,
    /// The pipeline could not run to completion (missing config, container
    /// setup failure, persistence failure, etc).
    Error,
}

impl JobStatus {
    /// `true` once the job has reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// One run ("iteration") of a named job for a given project and commit.
///
/// Unique by `(project_id, commit_id, job_name, iteration)`; `iteration`
/// starts at 1 and increments by 1 per re-run of the same triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Auto-assigned, monotonic, positive identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Commit SHA this run executed against.
    pub commit_id: String,
    /// Name of the job (currently always derived from the pipeline; kept
    /// as a field because the original Go source allows multiple named
    /// jobs per pipeline file in principle, even though this spec's
    /// pipeline format only ever produces one).
    pub job_name: String,
    /// 1-based re-run counter for this `(project, commit, job_name)` triple.
    pub iteration: i64,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Free-form human-readable text; commonly an error message when
    /// `status == Error`.
    pub extra: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// One line of container stdout/stderr, tagged with the timestamp the
/// container runtime attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Auto-assigned identifier; per-job, `id` order reflects ingest order
    /// (spec.md §3 — not required to be globally ordered).
    pub id: i64,
    /// Owning job.
    pub job_id: i64,
    /// Body of the line (container-emitted timestamp already stripped).
    pub data: String,
    /// Container-emitted RFC3339 nanosecond timestamp.
    pub timestamp: DateTime<Utc>,
}
