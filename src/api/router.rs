use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes: no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected routes: require Bearer token when API_TOKEN is set
    let protected = Router::new()
        .route("/api/status", get(handlers::health::status))
        .route("/api/whales", get(handlers::whales::list))
        .route("/api/whales/:address", get(handlers::whales::by_address))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
