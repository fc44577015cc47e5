use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;
use tracking_cell::router::tracking_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Backflow scheduling API is running!" }))
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/tracking", tracking_routes(state.clone()))
}
