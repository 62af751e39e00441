// SPDX-License-Identifier: MIT OR Apache-2.0
//! octorunner daemon: loads configuration, opens the store, wires every
//! collaborator into a [`PushOrchestrator`], and serves the webhook
//! dispatcher until an OS interrupt is received.

use clap::Parser;
use octorunner_auth::CredentialStore;
use octorunner_core::EventScope;
use octorunner_daemon::{build_app, AppState};
use octorunner_executor::ContainerExecutor;
use octorunner_forge::ForgeClient;
use octorunner_orchestrator::PushOrchestrator;
use octorunner_snapshot::SnapshotFetcher;
use octorunner_store::Store;
use std::path::PathBuf;
use std::time::Duration;

const GITHUB_WEB_BASE: &str = "https://github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "octorunner", about = "Self-hosted push-driven CI runner")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "OCTORUNNER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = octorunner_config::load_config(args.config.as_deref())?;

    init_tracing(&config.log.level);

    let warnings = octorunner_config::validate_config(&config)?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    let bind = format!("{}:{}", config.web.server, config.web.port);
    let path = format!("/{}", config.web.path.trim_start_matches('/'));
    let db_path = PathBuf::from(&config.database.path);

    let store = Store::open(&db_path)?;
    let credentials = CredentialStore::new(config.clone());
    let snapshot_fetcher = SnapshotFetcher::new(GITHUB_WEB_BASE, GITHUB_API_BASE)?;
    let forge_client = ForgeClient::new(GITHUB_API_BASE)?;
    let docker = bollard::Docker::connect_with_local_defaults()?;
    let executor = ContainerExecutor::new(docker);

    let orchestrator = PushOrchestrator::new(
        credentials.clone(),
        snapshot_fetcher,
        store,
        forge_client,
        executor,
    );

    let state = AppState {
        credentials,
        orchestrator,
        shutdown: EventScope::new(),
    };

    let app = build_app(&path, state.clone());

    tracing::info!(%bind, webhook_path = %path, "starting octorunner");
    let listener = tokio::net::TcpListener::bind(&bind).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Waits for SIGINT/SIGTERM, cancels every in-flight event scope, then
/// grants them a grace period to clean up before the listener stops
/// accepting new connections (spec.md §4.10 "Shutdown").
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, cancelling in-flight events");
    state.shutdown.cancel();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
