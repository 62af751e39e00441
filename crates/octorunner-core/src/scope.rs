// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-event execution scope (spec.md §3 "Per-event scope", §9).
//!
//! The reference Go sources stash `{full_name, commit_id, fs_location}`
//! inside a `context.Context` value map and pull them back out by string
//! key inside the executor. Per spec.md §9's re-architecture note, this is
//! replaced by a typed [`EventDescriptor`] passed as a plain argument, and a
//! [`CancellationToken`]-backed [`EventScope`] that every suspension point
//! (network I/O, filesystem I/O, container wait) can select against.

use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything the executor needs to name and locate a single pipeline run.
///
/// Carries what the reference implementation keyed out of its context value
/// map; here it's a typed struct instead, so there's no "key missing" error
/// path (spec.md §9).
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    /// `"<owner>/<repo>"`.
    pub full_name: String,
    /// Commit SHA the pipeline is running against.
    pub commit_id: String,
    /// Root of the extracted source snapshot on local disk.
    pub fs_location: PathBuf,
}

/// Cancellable, optionally-deadlined envelope for one webhook-triggered run.
///
/// Created at webhook dispatch, destroyed after the orchestrator returns.
/// Cloning an `EventScope` shares the same cancellation signal — cancel any
/// clone and every suspension point watching it unblocks.
#[derive(Debug, Clone)]
pub struct EventScope {
    token: CancellationToken,
    deadline: Option<Duration>,
}

impl EventScope {
    /// Create a new scope with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Create a new scope with a wall-clock deadline measured from creation.
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// The configured deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Signal cancellation; every clone of this scope observes it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once [`EventScope::cancel`] has been called on this scope or
    /// any of its clones.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the scope is cancelled. Suspension points race this
    /// against their own I/O future to stay cancellation-aware (spec.md §5).
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Run `fut` to completion unless the scope is cancelled first, in which
    /// case `None` is returned and `fut` is dropped.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// A child token derived from this scope, suitable for handing to a
    /// sibling task (e.g. the log drain) that should stop when either the
    /// scope or the task's own logic decides to.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// A child scope that cancels when this scope cancels, but can also be
    /// cancelled independently — used to stop a sibling task (the log
    /// drain) once its counterpart (the container wait) finishes, without
    /// cancelling the parent event.
    #[must_use]
    pub fn child_scope(&self) -> Self {
        Self {
            token: self.child_token(),
            deadline: self.deadline,
        }
    }
}

impl Default for EventScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn race_returns_none_when_cancelled_first() {
        let scope = EventScope::new();
        scope.cancel();
        let out = scope.race(async { 1_u32 }).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn race_returns_some_when_future_completes_first() {
        let scope = EventScope::new();
        let out = scope.race(async { 42_u32 }).await;
        assert_eq!(out, Some(42));
    }

    #[test]
    fn clones_share_cancellation() {
        let scope = EventScope::new();
        let clone = scope.clone();
        clone.cancel();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn default_has_no_deadline() {
        assert_eq!(EventScope::default().deadline(), None);
    }

    #[test]
    fn child_scope_cancels_independently_of_parent() {
        let parent = EventScope::new();
        let child = parent.child_scope();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn parent_cancellation_propagates_to_child_scope() {
        let parent = EventScope::new();
        let child = parent.child_scope();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
