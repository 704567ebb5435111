//! # apiprobe-web
//!
//! HTTP front end for apiprobe: submit runs, poll their status and re-run
//! finished tasks against another base URL.
//!
//! - `GET  /api/health`
//! - `POST /api/project/run`
//! - `GET  /api/project/task/{taskId}`
//! - `POST /api/project/rerun/{taskId}`

pub mod routes;

use apiprobe_adapters::build_collaborators;
use apiprobe_core::{
    InMemoryTaskStore, JsonTaskStore, Pipeline, ProbeConfig, StoreError, TaskRunner, TaskStore,
};
use apiprobe_proto::CollaboratorError;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to set up collaborators: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Failed to open task store: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub runner: TaskRunner,
}

impl AppState {
    pub fn new(runner: TaskRunner) -> Self {
        Self { runner }
    }

    /// Wires the real adapters and the configured task store.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ServerError> {
        let collaborators = build_collaborators(config)?;
        let pipeline = Arc::new(Pipeline::new(collaborators, config.pipeline_config()));
        let store: Arc<dyn TaskStore> = match &config.store.dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Persisting tasks");
                Arc::new(JsonTaskStore::open(dir)?)
            }
            None => Arc::new(InMemoryTaskStore::new()),
        };
        Ok(Self::new(TaskRunner::new(pipeline, store)))
    }
}

/// Create the application router from configuration.
pub fn create_app(config: &ProbeConfig) -> Result<Router, ServerError> {
    Ok(create_app_with_state(AppState::from_config(config)?))
}

/// Create the application router with provided state (for dependency injection)
pub fn create_app_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::api_routes(state))
        .layer(cors)
}

/// Serve the Run API on `0.0.0.0:<server.port>` until the process exits.
pub async fn serve(config: &ProbeConfig) -> Result<(), ServerError> {
    let app = create_app(config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Run API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
