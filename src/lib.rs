pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod meeting;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod repo;
pub mod routes;
pub mod scheduling;
pub mod uploads;

use axum::{Router, http::header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::AppState;

/// Full application: routes plus CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
