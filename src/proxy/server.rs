//! HTTP server setup and configuration.

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::rechunk::Pacing;
use super::upstream::{CompletionParams, OpenAiUpstream, Upstream};
use super::user_data;
use crate::config::Config;
use crate::router::{ProviderRegistry, Selector};
use crate::storage::{BlobStore, HttpBlobStore, MemoryBlobStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub selector: Arc<Selector>,
    pub upstream: Arc<dyn Upstream>,
    pub blobs: Arc<dyn BlobStore>,
    pub pacing: Pacing,
    pub completion: CompletionParams,
}

impl AppState {
    /// Build the production state: OpenAI-compatible upstream client and the
    /// configured blob store (in-memory when none is configured).
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(config.server.connect_timeout())
            .build()?;

        let blobs: Arc<dyn BlobStore> = match &config.storage {
            Some(storage) => {
                tracing::info!(base_url = %storage.base_url, "Using remote blob store");
                Arc::new(HttpBlobStore::new(http_client.clone(), storage))
            }
            None => {
                tracing::warn!("No blob store configured - user data is kept in memory only");
                Arc::new(MemoryBlobStore::new())
            }
        };

        Ok(Self {
            selector: Arc::new(Selector::new(ProviderRegistry::new(
                config.providers.clone(),
            ))),
            upstream: Arc::new(OpenAiUpstream::new(http_client)),
            blobs,
            pacing: Pacing::from(&config.pacing),
            completion: CompletionParams::from(&config.completion),
        })
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Streaming relay
        .route(
            "/api/chat",
            post(handlers::chat)
                .options(handlers::preflight_post)
                .fallback(handlers::method_not_allowed),
        )
        // User data
        .route(
            "/api/save-user-data",
            post(user_data::save_user_data)
                .options(handlers::preflight_post)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/load-user-data",
            get(user_data::load_user_data)
                .options(handlers::preflight_get)
                .fallback(handlers::method_not_allowed),
        )
        // Operational endpoints
        .route("/health", get(handlers::health))
        .route("/providers", get(handlers::list_providers))
        // State and middleware
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::from_config(&config)?;

    tracing::info!(
        providers = state.selector.registry().len(),
        slice_chars = state.pacing.slice_chars(),
        interval_ms = state.pacing.interval().as_millis() as u64,
        "Relay configured"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting chatrelay server");

    axum::serve(listener, app).await?;

    Ok(())
}
