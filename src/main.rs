// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SportLink API Server
//!
//! Serves the activity board over HTTP, backed either by Firebase
//! Authentication + Firestore or by process-local backends for development.

use sportlink::{
    config::{Backend, Config},
    db::{ActivityStore, FirestoreDb, MemoryStore},
    services::{ActivityRepository, FirebaseAuthClient, IdentityProvider, MemoryIdentityProvider},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.backend,
        app_id = %config.app_id,
        "Starting SportLink API"
    );

    let (store, identity): (Arc<dyn ActivityStore>, Arc<dyn IdentityProvider>) =
        match config.backend {
            Backend::Gcp => {
                let db = FirestoreDb::new(&config.gcp_project_id, &config.app_id).await?;
                let api_key = config.firebase_api_key.clone().unwrap_or_default();
                (Arc::new(db), Arc::new(FirebaseAuthClient::new(api_key)))
            }
            Backend::Memory => {
                tracing::warn!("Using in-memory backends; data is lost on restart");
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryIdentityProvider::new()),
                )
            }
        };

    let repository = ActivityRepository::new(store, config.max_spots_ceiling);
    let feed = repository.open_feed().await?;
    tracing::info!(backend = repository.backend_name(), "Activity feed opened");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        repository,
        identity,
        feed,
    });

    // Build router
    let app = sportlink::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sportlink=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
