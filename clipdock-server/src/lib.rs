//! HTTP surface for the clipdock ingest broker.

use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use clipdock_core::{
    ExtensionClassifier, FolderSyncEngine, JobBroker, NoopSyncObserver, TargetStore,
};

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::config::Config;

/// Wire the core services behind a fresh application state.
pub async fn build_app_state(config: Config) -> anyhow::Result<AppState> {
    let store = Arc::new(TargetStore::load(config.state_path.clone()).await?);
    let broker = Arc::new(JobBroker::new(config.broker_config(), Arc::clone(&store)));
    let sync_engine = Arc::new(FolderSyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::new(ExtensionClassifier::default()),
        Arc::new(NoopSyncObserver),
        config.sync_config(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        store,
        broker,
        sync_engine,
    })
}

/// Build the full router: protocol routes at the root, admin under
/// /api/v1. Loopback-only deployments still get permissive CORS so
/// panel webviews with opaque origins can reach the protocol.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_protocol_router())
        .merge(routes::create_api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
