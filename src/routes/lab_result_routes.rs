// src/routes/lab_result_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{
    error::ApiError,
    middleware::{
        access::{caller_patient_id, require_admin, require_patient_access, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, Role, non_blank},
    policy::{Denial, ListScope},
    repo::{
        self,
        lab_results::{LabResultFields, LabResultRow},
        notifications::NewNotification,
    },
};

const RESULT_NOTIFICATION: &str = "Resultado";
const RESULT_ENTITY: &str = "resultados_laboratorio";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_results).post(create_result))
        .route("/paciente/{id_paciente}", get(patient_results))
        .route("/tipo/{tipo}", get(results_by_type))
        .route(
            "/{id}",
            get(get_result).put(update_result).delete(delete_result),
        )
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub tipo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabResultRequest {
    pub id_paciente: Option<i32>,
    pub fecha_examen: Option<NaiveDate>,
    pub tipo_examen: Option<String>,
    pub resultados: Option<JsonValue>,
    pub valores_referencia: Option<JsonValue>,
    pub interpretacion: Option<String>,
    pub id_doctor_ordenante: Option<i32>,
    pub id_doctor_interpreta: Option<i32>,
}

impl From<LabResultRequest> for LabResultFields {
    fn from(r: LabResultRequest) -> Self {
        Self {
            id_paciente: r.id_paciente,
            fecha_examen: r.fecha_examen,
            tipo_examen: r.tipo_examen,
            resultados: r.resultados,
            valores_referencia: r.valores_referencia,
            interpretacion: r.interpretacion,
            id_doctor_ordenante: r.id_doctor_ordenante,
            id_doctor_interpreta: r.id_doctor_interpreta,
        }
    }
}

fn result_notification(user_id: i32, result_id: i32, tipo: &str, fecha: NaiveDate) -> NewNotification {
    NewNotification {
        id_usuario_destino: user_id,
        tipo_notificacion: RESULT_NOTIFICATION.to_string(),
        titulo: format!("Nuevo resultado de {tipo}"),
        mensaje: format!("Se ha registrado un nuevo resultado de {tipo} con fecha {fecha}"),
        entidad_relacionada: Some(RESULT_ENTITY.to_string()),
        id_entidad: Some(result_id),
    }
}

/// Which results the caller may browse: admins and approved doctors see
/// everything, patients their own, anyone else nothing.
async fn browse_scope(state: &AppState, auth: &AuthContext) -> Result<ListScope, ApiError> {
    match auth.role {
        Role::Admin => Ok(ListScope::All),
        Role::Doctor => match require_verified_doctor(state, auth).await {
            Ok(_) => Ok(ListScope::All),
            Err(ApiError::Forbidden(..)) => Ok(ListScope::Nothing),
            Err(e) => Err(e),
        },
        Role::Patient => Ok(caller_patient_id(state, auth)
            .await?
            .map_or(ListScope::Nothing, ListScope::Patient)),
    }
}

/// Best effort: the result is already stored when this runs.
async fn notify_patient(state: &AppState, result_id: i32, patient_id: i32, tipo: &str, fecha: NaiveDate) {
    let user_id = match repo::patients::user_id_of(&state.db, patient_id).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            tracing::warn!(patient_id, result_id, "no user for patient; result notification skipped");
            return;
        }
        Err(e) => {
            tracing::warn!(patient_id, result_id, error = %e, "result notification skipped");
            return;
        }
    };
    let notification = result_notification(user_id, result_id, tipo, fecha);
    if let Err(e) = repo::notifications::insert(&state.db, &notification).await {
        tracing::warn!(patient_id, result_id, error = %e, "result notification not stored");
    }
}

async fn load_result(state: &AppState, id: i32) -> Result<LabResultRow, ApiError> {
    repo::lab_results::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Lab result"))
}

pub async fn list_results(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ResultsQuery>,
) -> Result<Json<ApiOk<Vec<LabResultRow>>>, ApiError> {
    let rows = match browse_scope(&state, &auth).await? {
        ListScope::All => match non_blank(q.tipo.as_deref()) {
            Some(tipo) => repo::lab_results::by_type(&state.db, tipo).await?,
            None => repo::lab_results::list_all(&state.db).await?,
        },
        ListScope::Patient(patient_id) => repo::lab_results::by_patient(&state.db, patient_id).await?,
        ListScope::Doctor(_) | ListScope::Nothing => Vec::new(),
    };
    Ok(Json(ApiOk::data(rows)))
}

/// Patients only see their own results.
pub async fn get_result(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<LabResultRow>>, ApiError> {
    let result = load_result(&state, id).await?;
    if auth.role == Role::Patient && caller_patient_id(&state, &auth).await? != Some(result.id_paciente) {
        return Err(Denial::NotPermitted.into());
    }
    Ok(Json(ApiOk::data(result)))
}

pub async fn patient_results(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<LabResultRow>>>, ApiError> {
    require_patient_access(&state, &auth, patient_id).await?;
    let rows = repo::lab_results::by_patient(&state.db, patient_id).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn results_by_type(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(tipo): Path<String>,
) -> Result<Json<ApiOk<Vec<LabResultRow>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let rows = repo::lab_results::by_type(&state.db, tipo.trim()).await?;
    Ok(Json(ApiOk::data(rows)))
}

/// Stores the result, then notifies the patient's user account.
pub async fn create_result(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<LabResultRequest>,
) -> Result<(StatusCode, Json<ApiOk<LabResultRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;

    let (Some(patient_id), Some(fecha), Some(tipo), true) = (
        req.id_paciente,
        req.fecha_examen,
        non_blank(req.tipo_examen.as_deref()).map(str::to_owned),
        req.resultados.is_some(),
    ) else {
        return Err(ApiError::validation(
            "id_paciente, fecha_examen, tipo_examen and resultados are required",
        ));
    };

    let id = repo::lab_results::insert(&state.db, &req.into())
        .await
        .map_err(ApiError::from_write)?;
    tracing::info!(result_id = id, patient_id, tipo_examen = %tipo, "lab result recorded");

    notify_patient(&state, id, patient_id, &tipo, fecha).await;

    let result = load_result(&state, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Lab result created", result)),
    ))
}

pub async fn update_result(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<LabResultRequest>,
) -> Result<Json<ApiOk<LabResultRow>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::lab_results::update(&state.db, id, &req.into())
        .await
        .map_err(ApiError::from_write)?
    {
        return Err(ApiError::not_found("Lab result"));
    }
    let result = load_result(&state, id).await?;
    Ok(Json(ApiOk::with_message("Lab result updated", result)))
}

/// Hard delete.
pub async fn delete_result(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    if !repo::lab_results::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Lab result"));
    }
    tracing::info!(result_id = id, "lab result deleted");
    Ok(Json(ApiOk::message("Lab result deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_points_back_at_the_result() {
        let fecha = NaiveDate::from_ymd_opt(2026, 4, 12).unwrap();
        let n = result_notification(7, 31, "Hemoglobina glicosilada", fecha);

        assert_eq!(n.id_usuario_destino, 7);
        assert_eq!(n.tipo_notificacion, "Resultado");
        assert_eq!(n.titulo, "Nuevo resultado de Hemoglobina glicosilada");
        assert!(n.mensaje.ends_with("con fecha 2026-04-12"));
        assert_eq!(n.entidad_relacionada.as_deref(), Some("resultados_laboratorio"));
        assert_eq!(n.id_entidad, Some(31));
    }

    #[test]
    fn request_keeps_structured_results() {
        let req: LabResultRequest = serde_json::from_str(
            r#"{"id_paciente":3,"fecha_examen":"2026-04-12","tipo_examen":"HbA1c","resultados":{"valor":7.2,"unidad":"%"}}"#,
        )
        .unwrap();
        let fields: LabResultFields = req.into();
        assert_eq!(fields.resultados.unwrap()["unidad"], "%");
        assert!(fields.valores_referencia.is_none());
    }
}
