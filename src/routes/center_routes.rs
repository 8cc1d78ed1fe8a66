// src/routes/center_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{access::require_admin, auth_context::AuthContext},
    models::{ApiOk, AppState, CENTER_ACTIVE, CENTER_INACTIVE, non_blank},
    repo::{
        self,
        centers::{CenterDoctorLink, CenterFields, CenterRow},
        doctors::DoctorRow,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_centers).post(create_center))
        .route(
            "/{id}",
            get(get_center).put(update_center).delete(delete_center),
        )
        .route("/{id}/doctores", get(center_doctors).post(link_doctor))
        .route("/{id}/doctores/{id_doctor}", delete(unlink_doctor))
}

#[derive(Debug, Deserialize)]
pub struct LinkDoctorRequest {
    pub id_doctor: Option<i32>,
}

fn check_fields(c: &CenterFields) -> Result<(), ApiError> {
    if let Some(estado) = c.estado.as_deref() {
        if estado != CENTER_ACTIVE && estado != CENTER_INACTIVE {
            return Err(ApiError::validation("estado must be Activo or Inactivo"));
        }
    }
    if let (Some(open), Some(close)) = (c.horario_apertura, c.horario_cierre) {
        if close <= open {
            return Err(ApiError::validation("horario_cierre must be after horario_apertura"));
        }
    }
    if matches!(c.latitud, Some(lat) if !(-90.0..=90.0).contains(&lat))
        || matches!(c.longitud, Some(lon) if !(-180.0..=180.0).contains(&lon))
    {
        return Err(ApiError::validation("latitud/longitud out of range"));
    }
    Ok(())
}

pub async fn list_centers(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<CenterRow>>>, ApiError> {
    let centers = repo::centers::list_active(&state.db).await?;
    Ok(Json(ApiOk::data(centers)))
}

pub async fn get_center(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<CenterRow>>, ApiError> {
    let center = repo::centers::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medical center"))?;
    Ok(Json(ApiOk::data(center)))
}

pub async fn create_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CenterFields>,
) -> Result<(StatusCode, Json<ApiOk<CenterRow>>), ApiError> {
    require_admin(&auth)?;
    if non_blank(req.nombre.as_deref()).is_none() || non_blank(req.direccion.as_deref()).is_none() {
        return Err(ApiError::validation("nombre and direccion are required"));
    }
    check_fields(&req)?;

    let center = repo::centers::insert(&state.db, &req)
        .await
        .map_err(ApiError::from_write)?;

    tracing::info!(center_id = center.id_centro, "medical center created");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Medical center created", center)),
    ))
}

pub async fn update_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<CenterFields>,
) -> Result<Json<ApiOk<CenterRow>>, ApiError> {
    require_admin(&auth)?;
    check_fields(&req)?;

    let center = repo::centers::update(&state.db, id, &req)
        .await
        .map_err(ApiError::from_write)?
        .ok_or_else(|| ApiError::not_found("Medical center"))?;
    Ok(Json(ApiOk::with_message("Medical center updated", center)))
}

/// Soft delete; the center keeps its doctor links.
pub async fn delete_center(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    repo::centers::deactivate(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medical center"))?;
    tracing::info!(center_id = id, "medical center deactivated");
    Ok(Json(ApiOk::message("Medical center deactivated")))
}

pub async fn center_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    let doctors = repo::doctors::by_center(&state.db, id).await?;
    Ok(Json(ApiOk::data(doctors)))
}

pub async fn link_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<LinkDoctorRequest>,
) -> Result<(StatusCode, Json<ApiOk<CenterDoctorLink>>), ApiError> {
    require_admin(&auth)?;
    let Some(doctor_id) = req.id_doctor else {
        return Err(ApiError::validation("id_doctor is required"));
    };
    repo::centers::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Medical center"))?;
    repo::doctors::find_by_id(&state.db, doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;

    let link = repo::centers::assign_doctor(&state.db, id, doctor_id)
        .await
        .map_err(ApiError::from_write)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Doctor linked to medical center", link)),
    ))
}

pub async fn unlink_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, doctor_id)): Path<(i32, i32)>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    if !repo::centers::unassign_doctor(&state.db, id, doctor_id).await? {
        return Err(ApiError::not_found("Doctor link"));
    }
    Ok(Json(ApiOk::message("Doctor unlinked from medical center")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::parse_time;

    #[test]
    fn closing_must_follow_opening() {
        let fields = CenterFields {
            horario_apertura: parse_time("18:00"),
            horario_cierre: parse_time("08:00"),
            ..CenterFields::default()
        };
        assert!(check_fields(&fields).is_err());
    }

    #[test]
    fn coordinates_and_status_are_checked() {
        let bad_lat = CenterFields { latitud: Some(91.0), ..CenterFields::default() };
        assert!(check_fields(&bad_lat).is_err());
        let bad_state = CenterFields { estado: Some("Cerrado".into()), ..CenterFields::default() };
        assert!(check_fields(&bad_state).is_err());
        let ok = CenterFields {
            latitud: Some(-12.05),
            longitud: Some(-77.04),
            estado: Some("Activo".into()),
            ..CenterFields::default()
        };
        assert!(check_fields(&ok).is_ok());
    }
}
