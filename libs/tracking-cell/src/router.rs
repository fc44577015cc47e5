// libs/tracking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn tracking_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/location", post(handlers::report_position))
        .route("/appointments/{appointment_id}/live", get(handlers::get_live_view))
        .route(
            "/appointments/{appointment_id}/consent",
            post(handlers::set_tracking_consent),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
