//! Router configuration for Web API.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    force_sync, list_feeds, list_items, login, mark_read, subscribe, update_feeds, AppState,
};
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    // Auth routes (no authentication required)
    let auth_routes = Router::new().route("/login", post(login));

    let feed_routes = Router::new()
        .route("/", get(list_feeds).post(subscribe))
        .route("/follow", put(update_feeds))
        .route("/:id/force-sync", put(force_sync))
        .route("/:id/items", get(list_items));

    let item_routes = Router::new().route("/:id/read", put(mark_read));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/feeds", feed_routes)
        .nest("/items", item_routes);

    // Clone jwt_state for the middleware closure
    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
