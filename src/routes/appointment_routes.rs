// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::{
        access::{
            list_scope, require_own_doctor_or_admin, require_patient_access,
            require_record_access, require_verified_doctor,
        },
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, AppointmentStatus},
    policy::ListScope,
    repo::{
        self,
        appointments::{AppointmentChanges, AppointmentRow, NewAppointment},
    },
    scheduling::{TimeRange, deserialize_opt_time, parse_time},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/proximas", get(upcoming_appointments))
        .route("/disponibilidad", get(check_availability))
        .route("/doctor/{id_doctor}", get(doctor_appointments))
        .route("/paciente/{id_paciente}", get(patient_appointments))
        .route(
            "/{id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(cancel_appointment),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentRequest {
    pub id_paciente: Option<i32>,
    pub id_doctor: Option<i32>,
    pub id_centro: Option<i32>,
    pub fecha: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub hora_inicio: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub hora_fin: Option<NaiveTime>,
    pub estado: Option<String>,
    pub tipo_cita: Option<String>,
    pub motivo: Option<String>,
    pub notas_previas: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub id_doctor: Option<i32>,
    pub fecha: Option<NaiveDate>,
    pub hora_inicio: Option<String>,
    pub hora_fin: Option<String>,
    pub excluir: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub disponible: bool,
}

fn parse_status(raw: Option<&str>) -> Result<Option<AppointmentStatus>, ApiError> {
    raw.map(|s| {
        AppointmentStatus::parse(s).ok_or_else(|| {
            ApiError::validation("estado must be Pendiente, Confirmada, Completada or Cancelada")
        })
    })
    .transpose()
}

fn slot(start: NaiveTime, end: NaiveTime) -> Result<TimeRange, ApiError> {
    TimeRange::new(start, end).ok_or_else(|| ApiError::validation("hora_fin must be after hora_inicio"))
}

fn schedule_conflict() -> ApiError {
    ApiError::BadRequest(
        "SCHEDULE_CONFLICT",
        "The doctor is not available in the selected time slot".into(),
    )
}

/// Whether an update has to pass the availability check. Only appointments
/// that end up blocking the calendar are checked; an already-blocking one is
/// checked again only when its slot moves.
fn needs_availability_check(
    moved: bool,
    current: Option<AppointmentStatus>,
    next: Option<AppointmentStatus>,
) -> bool {
    let current_blocks = current.is_some_and(AppointmentStatus::blocks_schedule);
    let resulting_blocks = next.map_or(current_blocks, AppointmentStatus::blocks_schedule);
    resulting_blocks && (moved || !current_blocks)
}

async fn ensure_available(
    state: &AppState,
    doctor_id: i32,
    fecha: NaiveDate,
    slot: &TimeRange,
    exclude: Option<i32>,
) -> Result<(), ApiError> {
    let clashes = repo::appointments::count_overlapping(&state.db, doctor_id, fecha, slot, exclude).await?;
    if clashes > 0 {
        tracing::debug!(doctor_id, %fecha, clashes, "appointment slot taken");
        return Err(schedule_conflict());
    }
    Ok(())
}

async fn load_appointment(state: &AppState, id: i32) -> Result<AppointmentRow, ApiError> {
    repo::appointments::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment"))
}

/* -------------------------
   Listings
--------------------------*/

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let scope = list_scope(&state, &auth).await?;
    let rows = repo::appointments::list(&state.db, scope).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn upcoming_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let scope = list_scope(&state, &auth).await?;
    let rows = repo::appointments::upcoming(&state.db, scope).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn doctor_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    require_own_doctor_or_admin(&state, &auth, doctor_id).await?;
    let rows = repo::appointments::list(&state.db, ListScope::Doctor(doctor_id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    require_patient_access(&state, &auth, patient_id).await?;
    let rows = repo::appointments::list(&state.db, ListScope::Patient(patient_id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn check_availability(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<Availability>>, ApiError> {
    let (Some(doctor_id), Some(fecha), Some(start), Some(end)) = (
        q.id_doctor,
        q.fecha,
        q.hora_inicio.as_deref().and_then(parse_time),
        q.hora_fin.as_deref().and_then(parse_time),
    ) else {
        return Err(ApiError::validation(
            "id_doctor, fecha, hora_inicio and hora_fin (HH:MM) are required",
        ));
    };
    let requested = slot(start, end)?;

    let clashes =
        repo::appointments::count_overlapping(&state.db, doctor_id, fecha, &requested, q.excluir).await?;
    Ok(Json(ApiOk::data(Availability { disponible: clashes == 0 })))
}

/* -------------------------
   Single appointment
--------------------------*/

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let appointment = load_appointment(&state, id).await?;
    require_record_access(&state, &auth, appointment.id_paciente, appointment.id_doctor).await?;
    Ok(Json(ApiOk::data(appointment)))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<AppointmentRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;

    let (Some(id_paciente), Some(id_doctor), Some(id_centro), Some(fecha), Some(start), Some(end)) = (
        req.id_paciente,
        req.id_doctor,
        req.id_centro,
        req.fecha,
        req.hora_inicio,
        req.hora_fin,
    ) else {
        return Err(ApiError::validation(
            "id_paciente, id_doctor, id_centro, fecha, hora_inicio and hora_fin are required",
        ));
    };
    let requested = slot(start, end)?;
    let estado = parse_status(req.estado.as_deref())?.unwrap_or(AppointmentStatus::Pending);

    ensure_available(&state, id_doctor, fecha, &requested, None).await?;

    let id = repo::appointments::insert(
        &state.db,
        &NewAppointment {
            id_paciente,
            id_doctor,
            id_centro,
            fecha,
            slot: requested,
            estado,
            tipo_cita: req.tipo_cita,
            motivo: req.motivo,
            notas_previas: req.notas_previas,
        },
    )
    .await
    .map_err(ApiError::from_write)?;

    let appointment = load_appointment(&state, id).await?;
    tracing::info!(appointment_id = id, id_doctor, id_paciente, "appointment booked");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Appointment created", appointment)),
    ))
}

/// Moving the appointment (doctor, date or time) or bringing a cancelled or
/// completed one back to Pendiente/Confirmada re-runs the availability check
/// against every other appointment.
pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<AppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let current = load_appointment(&state, id).await?;
    let estado = parse_status(req.estado.as_deref())?;

    let moved = req.id_doctor.is_some()
        || req.fecha.is_some()
        || req.hora_inicio.is_some()
        || req.hora_fin.is_some();
    let current_status = AppointmentStatus::parse(&current.estado);
    if needs_availability_check(moved, current_status, estado) {
        let doctor_id = req.id_doctor.unwrap_or(current.id_doctor);
        let fecha = req.fecha.unwrap_or(current.fecha);
        let requested = slot(
            req.hora_inicio.unwrap_or(current.hora_inicio),
            req.hora_fin.unwrap_or(current.hora_fin),
        )?;
        ensure_available(&state, doctor_id, fecha, &requested, Some(id)).await?;
    }

    let changes = AppointmentChanges {
        id_paciente: req.id_paciente,
        id_doctor: req.id_doctor,
        id_centro: req.id_centro,
        fecha: req.fecha,
        hora_inicio: req.hora_inicio,
        hora_fin: req.hora_fin,
        estado,
        tipo_cita: req.tipo_cita,
        motivo: req.motivo,
        notas_previas: req.notas_previas,
    };
    repo::appointments::update(&state.db, id, &changes)
        .await
        .map_err(ApiError::from_write)?;

    let appointment = load_appointment(&state, id).await?;
    Ok(Json(ApiOk::with_message("Appointment updated", appointment)))
}

/// Soft delete: the row stays with estado Cancelada.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::appointments::cancel(&state.db, id).await? {
        return Err(ApiError::not_found("Appointment"));
    }
    tracing::info!(appointment_id = id, by = auth.user_id, "appointment cancelled");
    Ok(Json(ApiOk::message("Appointment cancelled")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_optional_but_checked() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("Confirmada")).unwrap(), Some(AppointmentStatus::Confirmed));
        assert!(parse_status(Some("Reprogramada")).is_err());
    }

    #[test]
    fn inverted_slot_is_a_validation_error() {
        let nine = parse_time("09:00").unwrap();
        let half = parse_time("09:30").unwrap();
        assert!(slot(nine, half).is_ok());
        assert!(matches!(slot(half, nine), Err(ApiError::BadRequest("VALIDATION_ERROR", _))));
        assert!(matches!(slot(nine, nine), Err(ApiError::BadRequest(..))));
    }

    #[test]
    fn request_accepts_short_times() {
        let req: AppointmentRequest = serde_json::from_str(
            r#"{"id_doctor":1,"fecha":"2026-03-02","hora_inicio":"09:00","hora_fin":"09:30"}"#,
        )
        .unwrap();
        assert_eq!(req.hora_inicio, parse_time("09:00:00"));
        assert_eq!(req.hora_fin, parse_time("09:30"));
        assert!(req.id_paciente.is_none());
    }

    #[test]
    fn reactivating_a_cancelled_appointment_is_checked() {
        use AppointmentStatus::*;
        assert!(needs_availability_check(false, Some(Cancelled), Some(Pending)));
        assert!(needs_availability_check(false, Some(Completed), Some(Confirmed)));
        assert!(!needs_availability_check(false, Some(Pending), Some(Confirmed)));
        assert!(!needs_availability_check(false, Some(Pending), None));
    }

    #[test]
    fn moving_is_checked_only_while_blocking() {
        use AppointmentStatus::*;
        assert!(needs_availability_check(true, Some(Pending), None));
        assert!(needs_availability_check(true, Some(Confirmed), Some(Pending)));
        assert!(!needs_availability_check(true, Some(Cancelled), None));
        assert!(!needs_availability_check(true, Some(Pending), Some(Cancelled)));
    }

    #[test]
    fn conflict_uses_its_own_code() {
        assert!(matches!(schedule_conflict(), ApiError::BadRequest("SCHEDULE_CONFLICT", _)));
    }
}
