use std::path::Path;

use axum::{Json, Router, http::StatusCode, routing::get};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::models::{ApiOk, AppState};

pub mod appointment_routes;
pub mod auth_routes;
pub mod center_routes;
pub mod consultation_routes;
pub mod doctor_routes;
pub mod foot_evaluation_routes;
pub mod lab_result_routes;
pub mod notification_routes;
pub mod patient_routes;
pub mod report_routes;
pub mod treatment_routes;
pub mod user_routes;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "OK",
        message: "API running",
    })
}

async fn route_not_found() -> (StatusCode, Json<ApiOk<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiOk::message("route not found")))
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes::router())
        .nest("/usuarios", user_routes::router())
        .nest("/pacientes", patient_routes::router())
        .nest("/doctores", doctor_routes::router())
        .nest("/citas", appointment_routes::router())
        .nest("/centros", center_routes::router())
        .nest("/consultas", consultation_routes::router())
        .nest("/evaluaciones-pie", foot_evaluation_routes::router())
        .nest("/tratamientos", treatment_routes::router())
        .nest("/resultados", lab_result_routes::router())
        .nest("/reportes", report_routes::router())
        .nest("/notificaciones", notification_routes::router())
}

/// Every resource under `/api`, plus stored uploads under `/uploads`.
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(Path::new(&state.upload_dir));
    Router::new()
        .nest("/api", api())
        .nest_service("/uploads", uploads)
        .fallback(route_not_found)
        .with_state(state)
}
