//! Live match backend entrypoint wiring storage, recovery, the live monitor and the HTTP layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_match_back::{
    config::AppConfig,
    dao::{
        live_store::{LiveMatchStore, memory::MemoryLiveStore},
        match_records::{MatchRecordStore, memory::MemoryMatchRecords},
    },
    routes,
    services::{
        monitor, recovery,
        storage_supervisor::{self, SupervisorPolicy},
    },
    state::{AppState, SharedState},
};

/// Selects the persistence adapters: `memory` or `external` (MongoDB + PostgreSQL).
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let (live, records) = connect_stores().await?;
    let app_state = AppState::new(config, live, records);

    let outcome = recovery::reconcile(&app_state)
        .await
        .context("reconciling live session at startup")?;
    info!(?outcome, "startup reconciliation done");

    monitor::spawn(app_state.clone());
    storage_supervisor::spawn(app_state.clone(), SupervisorPolicy::default());

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

type Stores = (Arc<dyn LiveMatchStore>, Arc<dyn MatchRecordStore>);

async fn connect_stores() -> anyhow::Result<Stores> {
    let backend = env::var(STORAGE_BACKEND_ENV).unwrap_or_else(|_| "external".into());
    match backend.as_str() {
        "memory" => {
            warn!("using in-memory stores; nothing survives a restart");
            Ok((
                Arc::new(MemoryLiveStore::new()),
                Arc::new(MemoryMatchRecords::new()),
            ))
        }
        "external" => connect_external().await,
        other => anyhow::bail!("unknown {STORAGE_BACKEND_ENV} `{other}` (expected memory or external)"),
    }
}

#[cfg(all(feature = "mongo-store", feature = "pg-records"))]
async fn connect_external() -> anyhow::Result<Stores> {
    use live_match_back::dao::{
        live_store::mongodb::{MongoConfig, MongoLiveStore},
        match_records::postgres::PgMatchRecords,
    };

    let mongo_config = MongoConfig::from_env()
        .await
        .context("reading MongoDB settings")?;
    let live = MongoLiveStore::connect(mongo_config)
        .await
        .context("connecting to MongoDB")?;
    let records = PgMatchRecords::connect_from_env()
        .await
        .context("connecting to PostgreSQL")?;
    info!("connected to MongoDB and PostgreSQL");

    Ok((Arc::new(live), Arc::new(records)))
}

#[cfg(not(all(feature = "mongo-store", feature = "pg-records")))]
async fn connect_external() -> anyhow::Result<Stores> {
    anyhow::bail!("built without the mongo-store and pg-records features; set {STORAGE_BACKEND_ENV}=memory")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
