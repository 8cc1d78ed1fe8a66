// src/routes/treatment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{
        access::{list_scope, require_patient_access, require_record_access, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, non_blank},
    policy::ListScope,
    repo::{
        self,
        treatments::{FollowUpFields, FollowUpRow, TreatmentFields, TreatmentRow},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_treatments).post(create_treatment))
        .route("/paciente/{id_paciente}", get(patient_treatments))
        .route("/consulta/{id_consulta}", get(consultation_treatments))
        .route("/seguimientos/{id_seguimiento}", put(update_follow_up).delete(delete_follow_up))
        .route(
            "/{id}",
            get(get_treatment)
                .put(update_treatment)
                .delete(cancel_treatment),
        )
        .route("/{id}/seguimientos", get(list_follow_ups).post(add_follow_up))
}

#[derive(Debug, Default, Deserialize)]
pub struct TreatmentRequest {
    pub id_consulta: Option<i32>,
    pub tipo_tratamiento: Option<String>,
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub dosis: Option<String>,
    pub frecuencia: Option<String>,
    pub duracion: Option<String>,
    pub instrucciones_especiales: Option<String>,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub estado: Option<String>,
}

impl TreatmentRequest {
    fn into_fields(self) -> Result<TreatmentFields, ApiError> {
        if let (Some(start), Some(end)) = (self.fecha_inicio, self.fecha_fin) {
            if end < start {
                return Err(ApiError::validation("fecha_fin cannot be before fecha_inicio"));
            }
        }
        Ok(TreatmentFields {
            id_consulta: self.id_consulta,
            tipo_tratamiento: self.tipo_tratamiento,
            nombre: self.nombre,
            descripcion: self.descripcion,
            dosis: self.dosis,
            frecuencia: self.frecuencia,
            duracion: self.duracion,
            instrucciones_especiales: self.instrucciones_especiales,
            fecha_inicio: self.fecha_inicio,
            fecha_fin: self.fecha_fin,
            estado: self.estado,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FollowUpRequest {
    pub fecha_seguimiento: Option<DateTime<Utc>>,
    pub cumplimiento: Option<String>,
    pub efectos_secundarios: Option<String>,
    pub efectividad: Option<String>,
    pub observaciones: Option<String>,
}

impl From<FollowUpRequest> for FollowUpFields {
    fn from(r: FollowUpRequest) -> Self {
        Self {
            fecha_seguimiento: r.fecha_seguimiento,
            cumplimiento: r.cumplimiento,
            efectos_secundarios: r.efectos_secundarios,
            efectividad: r.efectividad,
            observaciones: r.observaciones,
        }
    }
}

async fn load_treatment(state: &AppState, id: i32) -> Result<TreatmentRow, ApiError> {
    repo::treatments::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Treatment"))
}

async fn load_follow_up(state: &AppState, id: i32) -> Result<FollowUpRow, ApiError> {
    repo::treatments::find_follow_up(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Follow-up"))
}

/* -------------------------
   Treatments
--------------------------*/

pub async fn list_treatments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<TreatmentRow>>>, ApiError> {
    let scope = list_scope(&state, &auth).await?;
    let rows = repo::treatments::list(&state.db, scope).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_treatments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<TreatmentRow>>>, ApiError> {
    require_patient_access(&state, &auth, patient_id).await?;
    let rows = repo::treatments::list(&state.db, ListScope::Patient(patient_id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn consultation_treatments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(consultation_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<TreatmentRow>>>, ApiError> {
    let owners = repo::consultations::owners(&state.db, consultation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation"))?;
    require_record_access(&state, &auth, owners.id_paciente, owners.id_doctor).await?;

    let rows = repo::treatments::by_consultation(&state.db, consultation_id).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn get_treatment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<TreatmentRow>>, ApiError> {
    let treatment = load_treatment(&state, id).await?;
    require_record_access(&state, &auth, treatment.id_paciente, treatment.id_doctor).await?;
    Ok(Json(ApiOk::data(treatment)))
}

pub async fn create_treatment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<TreatmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<TreatmentRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if req.id_consulta.is_none()
        || non_blank(req.tipo_tratamiento.as_deref()).is_none()
        || non_blank(req.nombre.as_deref()).is_none()
    {
        return Err(ApiError::validation("id_consulta, tipo_tratamiento and nombre are required"));
    }
    let fields = req.into_fields()?;

    let id = repo::treatments::insert(&state.db, &fields)
        .await
        .map_err(ApiError::from_write)?;
    let treatment = load_treatment(&state, id).await?;

    tracing::info!(treatment_id = id, consultation_id = treatment.id_consulta, "treatment prescribed");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Treatment created", treatment)),
    ))
}

pub async fn update_treatment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<TreatmentRequest>,
) -> Result<Json<ApiOk<TreatmentRow>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let fields = req.into_fields()?;

    if !repo::treatments::update(&state.db, id, &fields)
        .await
        .map_err(ApiError::from_write)?
    {
        return Err(ApiError::not_found("Treatment"));
    }
    let treatment = load_treatment(&state, id).await?;
    Ok(Json(ApiOk::with_message("Treatment updated", treatment)))
}

/// Soft delete: estado becomes Cancelado.
pub async fn cancel_treatment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::treatments::cancel(&state.db, id).await? {
        return Err(ApiError::not_found("Treatment"));
    }
    tracing::info!(treatment_id = id, by = auth.user_id, "treatment cancelled");
    Ok(Json(ApiOk::message("Treatment cancelled")))
}

/* -------------------------
   Follow-ups
--------------------------*/

pub async fn list_follow_ups(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<FollowUpRow>>>, ApiError> {
    let treatment = load_treatment(&state, id).await?;
    require_record_access(&state, &auth, treatment.id_paciente, treatment.id_doctor).await?;
    let rows = repo::treatments::follow_ups(&state.db, id).await?;
    Ok(Json(ApiOk::data(rows)))
}

/// The recording doctor is the caller; admins record without one.
pub async fn add_follow_up(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<FollowUpRequest>,
) -> Result<(StatusCode, Json<ApiOk<FollowUpRow>>), ApiError> {
    let doctor_id = require_verified_doctor(&state, &auth).await?;
    if non_blank(req.cumplimiento.as_deref()).is_none() || non_blank(req.efectividad.as_deref()).is_none() {
        return Err(ApiError::validation("cumplimiento and efectividad are required"));
    }
    load_treatment(&state, id).await?;

    let follow_up_id = repo::treatments::insert_follow_up(&state.db, id, doctor_id, &req.into())
        .await
        .map_err(ApiError::from_write)?;
    let follow_up = load_follow_up(&state, follow_up_id).await?;

    tracing::info!(treatment_id = id, follow_up_id, "treatment follow-up recorded");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Follow-up recorded", follow_up)),
    ))
}

pub async fn update_follow_up(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<FollowUpRequest>,
) -> Result<Json<ApiOk<FollowUpRow>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::treatments::update_follow_up(&state.db, id, &req.into())
        .await
        .map_err(ApiError::from_write)?
    {
        return Err(ApiError::not_found("Follow-up"));
    }
    let follow_up = load_follow_up(&state, id).await?;
    Ok(Json(ApiOk::with_message("Follow-up updated", follow_up)))
}

pub async fn delete_follow_up(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::treatments::delete_follow_up(&state.db, id).await? {
        return Err(ApiError::not_found("Follow-up"));
    }
    Ok(Json(ApiOk::message("Follow-up deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_date_cannot_precede_start() {
        let req: TreatmentRequest = serde_json::from_str(
            r#"{"fecha_inicio":"2026-02-10","fecha_fin":"2026-02-01"}"#,
        )
        .unwrap();
        assert!(req.into_fields().is_err());

        let req: TreatmentRequest = serde_json::from_str(
            r#"{"id_consulta":4,"tipo_tratamiento":"Medicamento","nombre":"Metformina","fecha_inicio":"2026-02-01"}"#,
        )
        .unwrap();
        let fields = req.into_fields().unwrap();
        assert_eq!(fields.id_consulta, Some(4));
        assert!(fields.fecha_fin.is_none());
    }

    #[test]
    fn follow_up_request_maps_field_by_field() {
        let fields: FollowUpFields = FollowUpRequest {
            cumplimiento: Some("Parcial".into()),
            efectividad: Some("Buena".into()),
            ..FollowUpRequest::default()
        }
        .into();
        assert_eq!(fields.cumplimiento.as_deref(), Some("Parcial"));
        assert_eq!(fields.efectividad.as_deref(), Some("Buena"));
        assert!(fields.fecha_seguimiento.is_none());
    }
}
