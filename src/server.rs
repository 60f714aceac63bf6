use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, AccessBoundary};
use crate::config::Config;
use crate::db::WordStore;
use crate::handlers;
use crate::translation::Translator;

/// Services shared by every handler, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: WordStore,
    pub translator: Arc<Translator>,
    pub access: Arc<dyn AccessBoundary>,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = WordStore::open(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database_path))?;

        if config.auth_enabled() {
            info!(
                "Bearer token access enabled for {} owners",
                config.auth_tokens.len()
            );
        } else {
            info!("Open access: all entries belong to the anonymous owner");
        }

        Ok(Self {
            store,
            translator: Arc::new(Translator::new(config)),
            access: auth::boundary_from_config(config),
        })
    }
}

/// Build the HTTP router. Every /api route passes the access middleware.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/translate", post(handlers::translate_word))
        .route(
            "/api/words",
            post(handlers::save_words)
                .get(handlers::list_words)
                .delete(handlers::delete_words),
        )
        .route("/api/words/:id", delete(handlers::delete_word))
        .route("/api/stats", get(handlers::stats))
        .route("/api/frequency", get(handlers::frequency))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_caller,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve until Ctrl+C, then close the store
pub async fn serve(config: &Config, state: AppState) -> Result<()> {
    let store = state.store.clone();
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Arabic Writer listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
