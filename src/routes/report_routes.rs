// src/routes/report_routes.rs
//
// Read-only dashboards. Everything here is an aggregate over the clinical tables.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

use crate::{
    error::ApiError,
    middleware::{
        access::{caller_patient_id, require_admin, require_own_doctor_or_admin, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState},
    policy::Denial,
    repo::{
        self,
        appointments::AppointmentRow,
        consultations::ConsultationRow,
        reports::{
            DiabetesTypeCount, DoctorActivity, DoctorTotals, MonthCount, PatientTotals,
            RiskGradeCount, RiskLevelCount,
        },
        treatments::TreatmentRow,
    },
};

const YEAR_MONTHS: i32 = 12;
const DOCTOR_STATS_MONTHS: i32 = 6;
const DASHBOARD_ITEMS: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pacientes-por-tipo-diabetes", get(patients_by_diabetes_type))
        .route("/pacientes-por-nivel-riesgo", get(patients_by_risk_level))
        .route("/consultas-por-mes", get(consultations_per_month))
        .route("/evaluaciones-por-grado-riesgo", get(evaluations_by_risk_grade))
        .route("/estadisticas-por-doctor", get(doctor_activity))
        .route("/doctor/{id_doctor}/estadisticas", get(doctor_statistics))
        .route("/paciente/dashboard", get(patient_dashboard))
}

#[derive(Debug, Serialize)]
pub struct DoctorStatistics {
    pub estadisticas_basicas: DoctorTotals,
    pub pacientes_por_nivel_riesgo: Vec<RiskLevelCount>,
    pub consultas_por_mes: Vec<MonthCount>,
}

#[derive(Debug, Serialize)]
pub struct PatientDashboard {
    pub cantidades: PatientTotals,
    pub proximas_citas: Vec<AppointmentRow>,
    pub consultas_recientes: Vec<ConsultationRow>,
    pub tratamientos_activos: Vec<TreatmentRow>,
}

pub async fn patients_by_diabetes_type(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DiabetesTypeCount>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let rows = repo::reports::patients_by_diabetes_type(&state.db).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patients_by_risk_level(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RiskLevelCount>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let rows = repo::reports::patients_by_risk_level(&state.db, None).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn consultations_per_month(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<MonthCount>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let rows = repo::reports::consultations_per_month(&state.db, YEAR_MONTHS, None).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn evaluations_by_risk_grade(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RiskGradeCount>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let rows = repo::reports::evaluations_by_risk_grade(&state.db).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn doctor_activity(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DoctorActivity>>>, ApiError> {
    require_admin(&auth)?;
    let rows = repo::reports::doctor_activity(&state.db).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn doctor_statistics(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<i32>,
) -> Result<Json<ApiOk<DoctorStatistics>>, ApiError> {
    require_own_doctor_or_admin(&state, &auth, doctor_id).await?;

    let estadisticas_basicas = repo::reports::doctor_totals(&state.db, doctor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    let pacientes_por_nivel_riesgo = repo::reports::patients_by_risk_level(&state.db, Some(doctor_id)).await?;
    let consultas_por_mes =
        repo::reports::consultations_per_month(&state.db, DOCTOR_STATS_MONTHS, Some(doctor_id)).await?;

    Ok(Json(ApiOk::data(DoctorStatistics {
        estadisticas_basicas,
        pacientes_por_nivel_riesgo,
        consultas_por_mes,
    })))
}

/// The caller's own patient dashboard. Callers without a patient profile get 403.
pub async fn patient_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<PatientDashboard>>, ApiError> {
    let Some(patient_id) = caller_patient_id(&state, &auth).await? else {
        return Err(Denial::NotPermitted.into());
    };

    let cantidades = repo::reports::patient_totals(&state.db, patient_id).await?;
    let proximas_citas = repo::appointments::next_for_patient(&state.db, patient_id, DASHBOARD_ITEMS).await?;
    let consultas_recientes =
        repo::consultations::recent_for_patient(&state.db, patient_id, DASHBOARD_ITEMS).await?;
    let tratamientos_activos = repo::treatments::active_for_patient(&state.db, patient_id).await?;

    Ok(Json(ApiOk::data(PatientDashboard {
        cantidades,
        proximas_citas,
        consultas_recientes,
        tratamientos_activos,
    })))
}
