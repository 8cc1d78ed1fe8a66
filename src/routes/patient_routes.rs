// src/routes/patient_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::{
        access::{require_admin, require_patient_access, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, RISK_LEVELS, Role, non_blank},
    policy::ListScope,
    repo::{
        self,
        appointments::AppointmentRow,
        consultations::ConsultationRow,
        doctors::DoctorRow,
        foot_evaluations::EvaluationRow,
        lab_results::LabResultRow,
        patients::{PatientFields, PatientRow},
        users::{NewUser, UserChanges},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/perfil", post(complete_profile))
        .route("/", get(list_patients).post(create_patient))
        .route(
            "/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/{id}/consultas", get(patient_consultations))
        .route("/{id}/citas", get(patient_appointments))
        .route("/{id}/evaluaciones-pie", get(patient_foot_evaluations))
        .route("/{id}/resultados-laboratorio", get(patient_lab_results))
        .route("/{id}/doctores", get(patient_doctors))
}

/// Body for every patient write. Identity fields are only read when a new
/// user account is created (or, on update, for the contact fields).
#[derive(Debug, Default, Deserialize)]
pub struct PatientRequest {
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

    pub id_doctor_principal: Option<i32>,
    pub tipo_sangre: Option<String>,
    pub peso: Option<f64>,
    pub altura: Option<f64>,
    pub alergias: Option<String>,
    pub fecha_diagnostico_diabetes: Option<NaiveDate>,
    pub tipo_diabetes: Option<String>,
    pub nivel_riesgo: Option<String>,
    pub observaciones: Option<String>,
}

impl PatientRequest {
    fn clinical(&self) -> Result<PatientFields, ApiError> {
        if let Some(level) = self.nivel_riesgo.as_deref() {
            if !RISK_LEVELS.contains(&level) {
                return Err(ApiError::validation(format!(
                    "nivel_riesgo must be one of {}",
                    RISK_LEVELS.join(", ")
                )));
            }
        }
        Ok(PatientFields {
            id_doctor_principal: self.id_doctor_principal,
            tipo_sangre: self.tipo_sangre.clone(),
            peso: self.peso,
            altura: self.altura,
            alergias: self.alergias.clone(),
            fecha_diagnostico_diabetes: self.fecha_diagnostico_diabetes,
            tipo_diabetes: self.tipo_diabetes.clone(),
            nivel_riesgo: self.nivel_riesgo.clone(),
            observaciones: self.observaciones.clone(),
        })
    }

    fn contact_changes(&self) -> UserChanges {
        UserChanges {
            nombre: self.nombre.clone(),
            apellido: self.apellido.clone(),
            telefono: self.telefono.clone(),
            direccion: self.direccion.clone(),
            ..UserChanges::default()
        }
    }
}

/* -------------------------
   Profile & CRUD
--------------------------*/

/// The caller completes their own patient profile and becomes a patient.
pub async fn complete_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PatientRequest>,
) -> Result<(StatusCode, Json<ApiOk<PatientRow>>), ApiError> {
    let fields = req.clinical()?;

    let mut tx = state.db.begin().await?;
    if repo::patients::id_for_user(&mut *tx, auth.user_id).await?.is_some() {
        return Err(ApiError::validation("This user already has a patient profile"));
    }
    if auth.role != Role::Patient {
        repo::users::set_role(&mut *tx, auth.user_id, Role::Patient.id()).await?;
    }
    let patient_id = repo::patients::insert(&mut *tx, auth.user_id, &fields)
        .await
        .map_err(ApiError::from_write)?;
    let patient = repo::patients::find_by_id(&mut *tx, patient_id)
        .await?
        .ok_or_else(|| ApiError::Internal("patient vanished after insert".into()))?;
    tx.commit().await?;

    tracing::info!(user_id = auth.user_id, patient_id, "patient profile completed");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Patient profile created", patient)),
    ))
}

pub async fn list_patients(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let patients = repo::patients::list_active(&state.db).await?;
    Ok(Json(ApiOk::data(patients)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let patient = repo::patients::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    Ok(Json(ApiOk::data(patient)))
}

/// Creates a user and its patient profile, or attaches a profile to the
/// user already registered under `email`. All or nothing.
pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PatientRequest>,
) -> Result<(StatusCode, Json<ApiOk<PatientRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;

    let Some(email) = non_blank(req.email.as_deref()) else {
        return Err(ApiError::validation("email is required"));
    };
    let fields = req.clinical()?;

    let mut tx = state.db.begin().await?;
    let user_id = match repo::users::find_by_email(&mut *tx, email).await? {
        Some(existing) => {
            if repo::patients::id_for_user(&mut *tx, existing.id_usuario).await?.is_some() {
                return Err(ApiError::validation("This user already has a patient profile"));
            }
            if existing.id_rol != Role::Patient.id() {
                repo::users::set_role(&mut *tx, existing.id_usuario, Role::Patient.id()).await?;
            }
            existing.id_usuario
        }
        None => {
            let (Some(nombre), Some(apellido), Some(password)) = (
                non_blank(req.nombre.as_deref()),
                non_blank(req.apellido.as_deref()),
                non_blank(req.password.as_deref()),
            ) else {
                return Err(ApiError::validation(
                    "nombre, apellido and password are required for a new user",
                ));
            };
            let password_hash = hash_password(password).map_err(ApiError::Internal)?;
            let user = repo::users::insert(
                &mut *tx,
                &NewUser {
                    id_rol: Role::Patient.id(),
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
            user.id_usuario
        }
    };

    let patient_id = repo::patients::insert(&mut *tx, user_id, &fields)
        .await
        .map_err(ApiError::from_write)?;
    let patient = repo::patients::find_by_id(&mut *tx, patient_id)
        .await?
        .ok_or_else(|| ApiError::Internal("patient vanished after insert".into()))?;
    tx.commit().await?;

    tracing::info!(patient_id, user_id, created_by = auth.user_id, "patient created");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Patient profile created", patient)),
    ))
}

pub async fn update_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<PatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let fields = req.clinical()?;
    let contact = req.contact_changes();

    let mut tx = state.db.begin().await?;
    let current = repo::patients::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;

    repo::patients::update(&mut *tx, id, &fields)
        .await
        .map_err(ApiError::from_write)?;
    if !contact.is_empty() {
        repo::users::update(&mut *tx, current.id_usuario, &contact)
            .await
            .map_err(ApiError::from_write)?;
    }

    let patient = repo::patients::find_by_id(&mut *tx, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient"))?;
    tx.commit().await?;

    Ok(Json(ApiOk::with_message("Patient updated", patient)))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    if !repo::patients::deactivate(&state.db, id).await? {
        return Err(ApiError::not_found("Patient"));
    }
    tracing::info!(patient_id = id, "patient deactivated");
    Ok(Json(ApiOk::message("Patient deactivated")))
}

/* -------------------------
   Patient sub-resources
--------------------------*/

pub async fn patient_consultations(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<ConsultationRow>>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let rows = repo::consultations::list(&state.db, ListScope::Patient(id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let rows = repo::appointments::list(&state.db, ListScope::Patient(id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_foot_evaluations(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<EvaluationRow>>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let rows = repo::foot_evaluations::list(&state.db, ListScope::Patient(id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_lab_results(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<LabResultRow>>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let rows = repo::lab_results::by_patient(&state.db, id).await?;
    Ok(Json(ApiOk::data(rows)))
}

/// Approved doctors explicitly assigned to the patient.
pub async fn patient_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    require_patient_access(&state, &auth, id).await?;
    let rows = repo::doctors::assigned_to_patient(&state.db, id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, patient_id = id, "assigned doctors lookup failed");
            Vec::new()
        });
    Ok(Json(ApiOk::data(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_is_checked() {
        let req = PatientRequest { nivel_riesgo: Some("Extremo".into()), ..PatientRequest::default() };
        assert!(matches!(req.clinical(), Err(ApiError::BadRequest(..))));

        let req = PatientRequest { nivel_riesgo: Some("Muy Alto".into()), ..PatientRequest::default() };
        assert_eq!(req.clinical().unwrap().nivel_riesgo.as_deref(), Some("Muy Alto"));
    }

    #[test]
    fn contact_changes_ignore_identity_fields() {
        let req = PatientRequest {
            nombre: Some("Luis".into()),
            email: Some("luis@example.com".into()),
            ..PatientRequest::default()
        };
        let changes = req.contact_changes();
        assert_eq!(changes.nombre.as_deref(), Some("Luis"));
        assert!(changes.email.is_none());
        assert!(!changes.is_empty());
        assert!(PatientRequest::default().contact_changes().is_empty());
    }
}
