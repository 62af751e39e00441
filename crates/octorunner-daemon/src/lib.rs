// SPDX-License-Identifier: MIT OR Apache-2.0
//! octorunner daemon library: the axum [`Router`] and shared [`AppState`],
//! split out of `main.rs` so tests can drive the app with
//! `tower::ServiceExt::oneshot` instead of binding a real listener
//! (mirrors `abp-daemon`'s own `build_app` export).

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

/// Builds the webhook dispatcher's router for the given `webhook_path`
/// (e.g. `/hooks/github`) and application state.
#[must_use]
pub fn build_app(webhook_path: &str, state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route(webhook_path, post(handlers::webhook))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
