use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Team routes, with request metrics
    let team_routes = Router::new()
        .route("/{team_id}/tickets", post(tickets::create_ticket))
        .route("/{team_id}/tickets/{id}", get(tickets::get_ticket))
        .route("/{team_id}/tickets/{id}/fix", post(tickets::fix_ticket))
        .route("/{team_id}/tickets/{id}/wontfix", post(tickets::wont_fix_ticket))
        .route(
            "/{team_id}/tickets/findings/{finding_id}",
            get(tickets::get_finding_ticket),
        )
        .route("/config", get(handlers::get_config))
        .layer(middleware::from_fn(metrics_middleware));

    // Operational routes, excluded from request metrics
    let ops_routes = Router::new()
        .route("/healthcheck", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    Router::new()
        .merge(team_routes)
        .merge(ops_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
