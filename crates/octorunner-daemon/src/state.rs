// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state handed to every axum handler.

use octorunner_auth::CredentialStore;
use octorunner_core::EventScope;
use octorunner_orchestrator::PushOrchestrator;

/// State shared across all webhook requests.
#[derive(Clone)]
pub struct AppState {
    /// Resolves per-repository tokens and webhook secrets.
    pub credentials: CredentialStore,
    /// Drives one push event through the full pipeline.
    pub orchestrator: PushOrchestrator,
    /// Root of every per-event scope; cancelling it cascades to every
    /// in-flight event (spec.md §4.10 "Shutdown").
    pub shutdown: EventScope,
}

impl AppState {
    /// A fresh per-event scope, child of the process-wide shutdown scope.
    #[must_use]
    pub fn new_event_scope(&self) -> EventScope {
        self.shutdown.child_scope()
    }
}
