//! Route table of the regflow server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, application_logs};
use crate::services::ApplicationLogService;
use crate::state::AppState;

/// Build the application router with all routes.
pub fn build_router(state: AppState, log_service: ApplicationLogService) -> Router {
    // The dashboard is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health))
        .with_state(state.clone());

    let log_routes = Router::new()
        .route(
            "/application-logs",
            get(application_logs::list).post(application_logs::create),
        )
        .route(
            "/application-logs/",
            get(application_logs::list).post(application_logs::create),
        )
        .route("/application-logs/bulk", post(application_logs::bulk_create))
        .route(
            "/application-logs/main-db/{id}",
            get(application_logs::list_by_main_db),
        )
        .route(
            "/application-logs/main-db/{id}/step/{step}",
            get(application_logs::list_by_step),
        )
        .route(
            "/application-logs/main-db/{id}/last-index",
            get(application_logs::last_index),
        )
        .route(
            "/application-logs/main-db/{id}/timeline",
            get(application_logs::timeline),
        )
        .route(
            "/application-logs/main-db/{id}/verify",
            get(application_logs::verify),
        )
        .route(
            "/application-logs/main-db/{id}/transition",
            post(application_logs::transition),
        )
        .route(
            "/application-logs/{id}",
            get(application_logs::get)
                .put(application_logs::update)
                .delete(application_logs::delete),
        )
        .route("/workflow/stages", get(handlers::workflow::stages))
        .with_state(log_service);

    let database_routes = Router::new()
        .route("/api/db/init", post(handlers::database::init_database))
        .route(
            "/api/db/validate",
            get(handlers::database::validate_database),
        )
        .with_state(state.db.clone());

    Router::new()
        .merge(health_routes)
        .merge(log_routes)
        .merge(database_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
