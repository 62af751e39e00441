// SPDX-License-Identifier: MIT OR Apache-2.0
//! Focused handler tests for the webhook dispatcher's two routes:
//! GET / (health) and POST <webhook path> (spec.md §4.9/§6).
//!
//! Grounded on `abp-daemon`'s own `tests/handler_tests.rs`: a `test_state`
//! helper wires real (not mocked) collaborators against in-memory/loopback
//! backends, and requests are driven through the router with
//! `tower::ServiceExt::oneshot` rather than a bound TCP listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use octorunner_auth::CredentialStore;
use octorunner_config::{RepositoryCredentials, RunnerConfig};
use octorunner_core::{EventScope, PushEvent, Repository, RepositoryOwner};
use octorunner_daemon::{build_app, AppState};
use octorunner_executor::ContainerExecutor;
use octorunner_forge::ForgeClient;
use octorunner_orchestrator::PushOrchestrator;
use octorunner_snapshot::SnapshotFetcher;
use octorunner_store::Store;
use sha1::Sha1;
use tower::ServiceExt;

const WEBHOOK_PATH: &str = "/hooks/github";

fn push_event(full_name: &str, after: &str) -> PushEvent {
    PushEvent {
        after: after.to_string(),
        repository: Repository {
            name: full_name.rsplit('/').next().unwrap().to_string(),
            full_name: full_name.to_string(),
            private: false,
            owner: RepositoryOwner {
                name: full_name.split('/').next().unwrap().to_string(),
            },
        },
    }
}

fn test_state(config: RunnerConfig) -> AppState {
    let credentials = CredentialStore::new(config);
    let snapshot_fetcher =
        SnapshotFetcher::new("https://example.invalid", "https://api.example.invalid")
            .expect("snapshot client");
    let store = Store::open_in_memory().expect("store");
    let forge_client = ForgeClient::new("https://api.example.invalid").expect("forge client");
    let executor = ContainerExecutor::new(
        bollard::Docker::connect_with_local_defaults().expect("docker handle"),
    );
    let orchestrator = PushOrchestrator::new(
        credentials.clone(),
        snapshot_fetcher,
        store,
        forge_client,
        executor,
    );

    AppState {
        credentials,
        orchestrator,
        shutdown: EventScope::new(),
    }
}

fn app_with(config: RunnerConfig) -> axum::Router {
    build_app(WEBHOOK_PATH, test_state(config))
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app_with(RunnerConfig::default());
    let resp = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "octorunner - healthy");
}

#[tokio::test]
async fn unsupported_event_kind_is_dropped_with_200() {
    let app = app_with(RunnerConfig::default());
    let event = push_event("alice/proj", "abc123");
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("X-GitHub-Event", "pull_request")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&event).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_is_dropped_with_200() {
    let app = app_with(RunnerConfig::default());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("X-GitHub-Event", "push")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejected_signature_is_dropped_with_200() {
    let mut config = RunnerConfig::default();
    config.repositories.insert(
        "alice/proj".to_string(),
        RepositoryCredentials {
            token: None,
            secret: Some("s3cret".to_string()),
        },
    );
    let app = app_with(config);
    let event = push_event("alice/proj", "abc123");
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("X-GitHub-Event", "push")
                .header("content-type", "application/json")
                .header("X-Hub-Signature", "sha1=0000000000000000000000000000000000000000")
                .body(Body::from(serde_json::to_vec(&event).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unverified_push_is_accepted_and_dispatched_without_blocking() {
    let app = app_with(RunnerConfig::default());
    let event = push_event("alice/proj", "abc123");
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("X-GitHub-Event", "push")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&event).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn verified_signature_is_accepted() {
    let mut config = RunnerConfig::default();
    config.repositories.insert(
        "alice/proj".to_string(),
        RepositoryCredentials {
            token: None,
            secret: Some("s3cret".to_string()),
        },
    );
    let app = app_with(config);
    let event = push_event("alice/proj", "abc123");
    let body = serde_json::to_vec(&event).unwrap();

    let mut mac = Hmac::<Sha1>::new_from_slice(b"s3cret").unwrap();
    mac.update(&body);
    let signature = format!("sha1={}", hex::encode(mac.finalize().into_bytes()));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(WEBHOOK_PATH)
                .header("X-GitHub-Event", "push")
                .header("content-type", "application/json")
                .header("X-Hub-Signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}
