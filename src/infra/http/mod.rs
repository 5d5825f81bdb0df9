//! Development HTTP server exposing the feed backend contract as JSON.

mod error;
mod handlers;
mod middleware;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::infra::error::InfraError;
use crate::infra::memory::InMemoryBackend;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct DevServerState {
    pub backend: Arc<InMemoryBackend>,
}

pub fn build_router(state: DevServerState) -> Router {
    Router::new()
        .route("/_health", get(handlers::health))
        .route(murmur_api_types::FEED_PATH, get(handlers::feed_page))
        .route(murmur_api_types::TWEETS_PATH, post(handlers::create_tweet))
        .route("/api/tweets/{id}/like", post(handlers::toggle_like))
        .route("/api/users/{id}/follow", post(handlers::toggle_follow))
        .route("/api/profiles/{id}", get(handlers::profile))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Serve the development API until the listener fails.
pub async fn serve(listener: TcpListener, state: DevServerState) -> Result<(), InfraError> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "Development server listening");
    axum::serve(listener, build_router(state).into_make_service())
        .await
        .map_err(|err| InfraError::http(format!("server error: {err}")))
}
