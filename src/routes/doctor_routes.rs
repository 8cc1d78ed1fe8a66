// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::{
        access::{require_admin, require_self_or_admin, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, Role, VerificationStatus, non_blank},
    repo::{
        self,
        assignments::AssignmentRow,
        centers::CenterRow,
        doctors::{DoctorChanges, DoctorRow, NewDoctor, ScheduleRow},
        patients::PatientRow,
        users::{NewUser, UserChanges},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/perfil", post(complete_profile))
        .route("/", get(list_doctors).post(create_doctor))
        .route("/{id}/verificar", put(verify_doctor))
        .route(
            "/{id}",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route("/{id}/centros", get(doctor_centers))
        .route("/{id}/horarios", get(doctor_schedules))
        .route(
            "/{id}/pacientes",
            get(primary_patients).post(assign_patient),
        )
        .route("/{id}/pacientes-asignados", get(assigned_patients))
        .route("/{id}/pacientes/{id_paciente}", delete(unassign_patient))
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorRequest {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub genero: Option<String>,
    pub numero_identificacion: Option<String>,
    pub tipo_identificacion: Option<String>,

    pub especialidad: Option<String>,
    pub numero_licencia: Option<String>,
    pub consulta_duracion_minutos: Option<i32>,
    pub biografia: Option<String>,
}

impl DoctorRequest {
    fn professional(&self) -> Result<DoctorChanges, ApiError> {
        if matches!(self.consulta_duracion_minutos, Some(m) if m <= 0) {
            return Err(ApiError::validation("consulta_duracion_minutos must be positive"));
        }
        Ok(DoctorChanges {
            especialidad: self.especialidad.clone(),
            numero_licencia: non_blank(self.numero_licencia.as_deref()).map(str::to_string),
            consulta_duracion_minutos: self.consulta_duracion_minutos,
            biografia: self.biografia.clone(),
        })
    }

    fn new_profile(&self, user_id: i32) -> Result<NewDoctor, ApiError> {
        let p = self.professional()?;
        Ok(NewDoctor {
            id_usuario: user_id,
            especialidad: p.especialidad,
            numero_licencia: p.numero_licencia,
            consulta_duracion_minutos: p.consulta_duracion_minutos,
            biografia: p.biografia,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub estado: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub id_paciente: Option<i32>,
}

/// Only approval or rejection can be set by hand.
fn parse_verdict(raw: Option<&str>) -> Result<VerificationStatus, ApiError> {
    match raw.and_then(VerificationStatus::parse) {
        Some(s @ (VerificationStatus::Approved | VerificationStatus::Rejected)) => Ok(s),
        _ => Err(ApiError::validation("estado must be Aprobado or Rechazado")),
    }
}

async fn load_doctor(state: &AppState, id: i32) -> Result<DoctorRow, ApiError> {
    repo::doctors::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))
}

/// Admin, or the approved doctor owning `doctor_id`.
async fn require_doctor_self(state: &AppState, auth: &AuthContext, doctor_id: i32) -> Result<(), ApiError> {
    let own = require_verified_doctor(state, auth).await?;
    if auth.is_admin() || own == Some(doctor_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/* -------------------------
   Profile & CRUD
--------------------------*/

/// The caller completes their own doctor profile; it starts unverified.
pub async fn complete_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<DoctorRequest>,
) -> Result<(StatusCode, Json<ApiOk<DoctorRow>>), ApiError> {
    let profile = req.new_profile(auth.user_id)?;

    let mut tx = state.db.begin().await?;
    if repo::doctors::has_profile(&mut *tx, auth.user_id).await? {
        return Err(ApiError::validation("This user already has a doctor profile"));
    }
    if let Some(license) = profile.numero_licencia.as_deref() {
        if repo::doctors::license_taken(&mut *tx, license, None).await? {
            return Err(ApiError::duplicate("License number is already registered"));
        }
    }
    if auth.role != Role::Doctor {
        repo::users::set_role(&mut *tx, auth.user_id, Role::Doctor.id()).await?;
    }
    let doctor_id = repo::doctors::insert(&mut *tx, &profile)
        .await
        .map_err(ApiError::from_write)?;
    let doctor = repo::doctors::find_by_id(&mut *tx, doctor_id)
        .await?
        .ok_or_else(|| ApiError::Internal("doctor vanished after insert".into()))?;
    tx.commit().await?;

    tracing::info!(user_id = auth.user_id, doctor_id, "doctor profile submitted for verification");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message(
            "Doctor profile created; pending administrator verification",
            doctor,
        )),
    ))
}

/// Admins also see pending and rejected profiles.
pub async fn list_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    let doctors = repo::doctors::list(&state.db, auth.is_admin()).await?;
    Ok(Json(ApiOk::data(doctors)))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    Ok(Json(ApiOk::data(load_doctor(&state, id).await?)))
}

/// New user plus doctor profile in one transaction.
pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<DoctorRequest>,
) -> Result<(StatusCode, Json<ApiOk<DoctorRow>>), ApiError> {
    require_admin(&auth)?;

    let (Some(nombre), Some(apellido), Some(email), Some(password)) = (
        non_blank(req.nombre.as_deref()),
        non_blank(req.apellido.as_deref()),
        non_blank(req.email.as_deref()),
        non_blank(req.password.as_deref()),
    ) else {
        return Err(ApiError::validation("nombre, apellido, email and password are required"));
    };
    req.professional()?;

    let mut tx = state.db.begin().await?;
    if repo::users::find_by_email(&mut *tx, email).await?.is_some() {
        return Err(ApiError::duplicate("Email is already registered"));
    }
    if let Some(license) = non_blank(req.numero_licencia.as_deref()) {
        if repo::doctors::license_taken(&mut *tx, license, None).await? {
            return Err(ApiError::duplicate("License number is already registered"));
        }
    }

    let password_hash = hash_password(password).map_err(ApiError::Internal)?;
    let user = repo::users::insert(
        &mut *tx,
        &NewUser {
            id_rol: Role::Doctor.id(),
            nombre: nombre.to_string(),
            apellido: apellido.to_string(),
            email: email.to_lowercase(),
            password_hash,
            telefono: req.telefono.clone(),
            direccion: req.direccion.clone(),
            fecha_nacimiento: req.fecha_nacimiento,
            genero: req.genero.clone(),
            numero_identificacion: req.numero_identificacion.clone(),
            tipo_identificacion: req.tipo_identificacion.clone(),
        },
    )
    .await
    .map_err(ApiError::from_write)?;

    let doctor_id = repo::doctors::insert(&mut *tx, &req.new_profile(user.id_usuario)?)
        .await
        .map_err(ApiError::from_write)?;
    let doctor = repo::doctors::find_by_id(&mut *tx, doctor_id)
        .await?
        .ok_or_else(|| ApiError::Internal("doctor vanished after insert".into()))?;
    tx.commit().await?;

    tracing::info!(doctor_id, user_id = user.id_usuario, "doctor created");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Doctor created", doctor)),
    ))
}

pub async fn verify_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    require_admin(&auth)?;
    let verdict = parse_verdict(req.estado.as_deref())?;

    if !repo::doctors::set_verification(&state.db, id, verdict).await? {
        return Err(ApiError::not_found("Doctor"));
    }
    let doctor = load_doctor(&state, id).await?;

    tracing::info!(doctor_id = id, estado = verdict.as_str(), by = auth.user_id, "doctor verification");
    let message = match verdict {
        VerificationStatus::Approved => "Doctor approved",
        _ => "Doctor rejected",
    };
    Ok(Json(ApiOk::with_message(message, doctor)))
}

/// Doctors may edit their own profile; admins any.
pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<DoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    let current = load_doctor(&state, id).await?;
    require_self_or_admin(&auth, current.id_usuario)?;

    let changes = req.professional()?;
    let contact = UserChanges {
        nombre: req.nombre.clone(),
        apellido: req.apellido.clone(),
        telefono: req.telefono.clone(),
        direccion: req.direccion.clone(),
        ..UserChanges::default()
    };

    let mut tx = state.db.begin().await?;
    if let Some(license) = changes.numero_licencia.as_deref() {
        if repo::doctors::license_taken(&mut *tx, license, Some(id)).await? {
            return Err(ApiError::duplicate("License number is already registered"));
        }
    }
    repo::doctors::update(&mut *tx, id, &changes)
        .await
        .map_err(ApiError::from_write)?;
    if !contact.is_empty() {
        repo::users::update(&mut *tx, current.id_usuario, &contact)
            .await
            .map_err(ApiError::from_write)?;
    }
    let doctor = repo::doctors::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Doctor"))?;
    tx.commit().await?;

    Ok(Json(ApiOk::with_message("Doctor updated", doctor)))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    if !repo::doctors::deactivate(&state.db, id).await? {
        return Err(ApiError::not_found("Doctor"));
    }
    tracing::info!(doctor_id = id, "doctor deactivated");
    Ok(Json(ApiOk::message("Doctor deactivated")))
}

/* -------------------------
   Centers & schedules
--------------------------*/

pub async fn doctor_centers(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<CenterRow>>>, ApiError> {
    load_doctor(&state, id).await?;
    let centers = repo::centers::for_doctor(&state.db, id).await?;
    Ok(Json(ApiOk::data(centers)))
}

pub async fn doctor_schedules(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<ScheduleRow>>>, ApiError> {
    load_doctor(&state, id).await?;
    let schedules = repo::doctors::schedules(&state.db, id).await?;
    Ok(Json(ApiOk::data(schedules)))
}

/* -------------------------
   Patients
--------------------------*/

/// Patients whose primary doctor is `id`.
pub async fn primary_patients(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    require_doctor_self(&state, &auth, id).await?;
    let patients = repo::patients::with_primary_doctor(&state.db, id).await?;
    Ok(Json(ApiOk::data(patients)))
}

pub async fn assigned_patients(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    require_doctor_self(&state, &auth, id).await?;
    load_doctor(&state, id).await?;
    let patients = repo::patients::assigned_to_doctor(&state.db, id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, doctor_id = id, "assigned patients lookup failed");
            Vec::new()
        });
    Ok(Json(ApiOk::data(patients)))
}

/// Idempotent; the doctor must be approved.
pub async fn assign_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<AssignRequest>,
) -> Result<(StatusCode, Json<ApiOk<AssignmentRow>>), ApiError> {
    require_doctor_self(&state, &auth, id).await?;
    let Some(patient_id) = req.id_paciente else {
        return Err(ApiError::validation("id_paciente is required"));
    };

    let doctor = load_doctor(&state, id).await?;
    if doctor.estado_verificacion != VerificationStatus::Approved.as_str() {
        return Err(ApiError::validation("Doctor is not verified"));
    }
    repo::patients::find_by_id(&state.db, patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;

    let assignment = repo::assignments::assign(&state.db, id, patient_id)
        .await
        .map_err(ApiError::from_write)?;

    tracing::info!(doctor_id = id, patient_id, "patient assigned");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Patient assigned", assignment)),
    ))
}

pub async fn unassign_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, patient_id)): Path<(i32, i32)>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_doctor_self(&state, &auth, id).await?;
    if !repo::assignments::unassign(&state.db, id, patient_id).await? {
        return Err(ApiError::not_found("Assignment"));
    }
    tracing::info!(doctor_id = id, patient_id, "patient unassigned");
    Ok(Json(ApiOk::message("Patient unassigned")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_accepts_only_final_states() {
        assert_eq!(parse_verdict(Some("Aprobado")).unwrap(), VerificationStatus::Approved);
        assert_eq!(parse_verdict(Some("Rechazado")).unwrap(), VerificationStatus::Rejected);
        assert!(parse_verdict(Some("Pendiente")).is_err());
        assert!(parse_verdict(Some("aprobado")).is_err());
        assert!(parse_verdict(None).is_err());
    }

    #[test]
    fn blank_license_is_treated_as_absent() {
        let req = DoctorRequest { numero_licencia: Some("  ".into()), ..DoctorRequest::default() };
        assert!(req.professional().unwrap().numero_licencia.is_none());
    }

    #[test]
    fn consultation_length_must_be_positive() {
        let req = DoctorRequest { consulta_duracion_minutos: Some(0), ..DoctorRequest::default() };
        assert!(req.professional().is_err());
        let req = DoctorRequest { consulta_duracion_minutos: Some(45), ..DoctorRequest::default() };
        assert_eq!(req.professional().unwrap().consulta_duracion_minutos, Some(45));
    }
}
