use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use pinegate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

use cors::build_cors_layer;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/api/admin/indicator-access/bulk",
            post(handlers::access::bulk_indicator_access_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/api/webhooks/stripe",
            post(handlers::webhooks::stripe_webhook_handler),
        )
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
