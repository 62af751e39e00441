// SPDX-License-Identifier: MIT OR Apache-2.0
//! Webhook Dispatcher (spec.md §4.9 C9).
//!
//! Grounded on `simple_git_cicd`'s `handle_webhook`: header-driven event
//! filter, `serde_json` body decode, per-repository signature check, then
//! hand off to a detached task so the forge's request gets an immediate
//! response (spec.md §4.9 "the dispatcher returns immediately").
//!
//! Unlike that teacher, the response is always `200` (spec.md §6: the forge
//! treats non-2xx as delivery failure and retries, so every rejection
//! reason below is logged rather than surfaced in the status code).

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use octorunner_auth::{verify_signature, SignaturePolicy};
use octorunner_core::PushEvent;
use tracing::{debug, error, info, warn};

const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature";
const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
const SUPPORTED_EVENT: &str = "push";

/// Liveness probe.
pub async fn health() -> &'static str {
    "octorunner - healthy"
}

/// Handles an inbound forge webhook POST (spec.md §4.9).
///
/// Always responds `200` once the body has been read, regardless of
/// whether the event was accepted, ignored, or rejected.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let peer = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let event_kind = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    if event_kind != Some(SUPPORTED_EVENT) {
        info!(?event_kind, %peer, "unsupported event kind, dropping");
        return StatusCode::OK;
    }

    let push: PushEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, %peer, "failed to decode push event payload, dropping");
            return StatusCode::OK;
        }
    };
    debug!(full_name = %push.repository.full_name, after = %push.after, %peer, "decoded push event");

    let secret = state
        .credentials
        .secret(&push.repository.full_name)
        .map(|(secret, _)| secret);
    let signature_header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match verify_signature(secret.as_deref(), &body, signature_header) {
        SignaturePolicy::Rejected => {
            warn!(full_name = %push.repository.full_name, %peer, "webhook signature rejected, dropping event");
            return StatusCode::OK;
        }
        SignaturePolicy::Verified => {
            debug!(full_name = %push.repository.full_name, "webhook signature verified");
        }
        SignaturePolicy::Unverified => {
            warn!(full_name = %push.repository.full_name, "no secret configured, processing unverified");
        }
    }

    let scope = state.new_event_scope();
    let orchestrator = state.orchestrator.clone();
    let full_name = push.repository.full_name.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.handle_push(&push, &scope).await {
            error!(error = %e, kind = %e.kind(), %full_name, "push event processing failed");
        }
    });

    StatusCode::OK
}
