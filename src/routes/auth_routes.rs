// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{TokenSubject, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Role, USER_ACTIVE, VerificationStatus, non_blank},
    repo::{self, users::{NewUser, UserChanges, UserRow}},
};

const ADMIN_SECRET_HEADER: &str = "admin-secret";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/profile", get(profile).put(update_profile))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of the logged-in user; mirrors the token claims.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub rol: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_doctor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_verificado: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_paciente: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
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
    pub rol: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: i32,
    pub nombre: String,
    pub email: String,
    pub rol: i32,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserRow,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
}

/// Self-registration defaults to patient. Doctors may sign up directly
/// (profile verification comes later); admins only with the shared secret.
pub fn resolve_register_role(
    requested: Option<i32>,
    provided_secret: Option<&str>,
    configured_secret: Option<&str>,
) -> Role {
    match requested {
        Some(1) => match (provided_secret, configured_secret) {
            (Some(given), Some(expected)) if !expected.is_empty() && given == expected => Role::Admin,
            _ => Role::Patient,
        },
        Some(2) => Role::Doctor,
        _ => Role::Patient,
    }
}

fn registration_message(role: Role) -> &'static str {
    match role {
        Role::Admin => "User registered with the administrator role",
        Role::Doctor => {
            "User registered with the doctor role. Complete the professional profile at /api/doctores/perfil"
        }
        Role::Patient => {
            "User registered with the patient role. Complete the medical profile at /api/pacientes/perfil"
        }
    }
}

/* -------------------------
   Handlers
--------------------------*/

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(email), Some(password)) = (non_blank(req.email.as_deref()), req.password.as_deref())
    else {
        return Err(ApiError::validation("email and password are required"));
    };
    if password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user = repo::users::find_by_email(&state.db, email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if user.estado != USER_ACTIVE {
        return Err(ApiError::inactive_account());
    }
    if !verify_password(password, &user.password) {
        return Err(ApiError::invalid_credentials());
    }

    let permissions = repo::users::permission_names(&state.db, user.id_rol).await?;

    let mut subject = TokenSubject {
        user_id: user.id_usuario,
        email: user.email.clone(),
        role: user.id_rol,
        permissions,
        ..TokenSubject::default()
    };

    match Role::try_from(user.id_rol) {
        Ok(Role::Doctor) => {
            if let Some(identity) = repo::doctors::identity_for_user(&state.db, user.id_usuario).await? {
                subject.doctor_id = Some(identity.id_doctor);
                subject.doctor_verified = Some(identity.status() == VerificationStatus::Approved);
            }
        }
        Ok(Role::Patient) => {
            subject.patient_id = repo::patients::id_for_user(&state.db, user.id_usuario).await?;
        }
        Ok(Role::Admin) => {}
        Err(e) => return Err(ApiError::Internal(e)),
    }

    let token = state
        .jwt
        .issue(&subject)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(user_id = user.id_usuario, role = user.id_rol, "login");

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: SessionUser {
            id: user.id_usuario,
            nombre: user.nombre,
            apellido: user.apellido,
            email: user.email,
            rol: user.id_rol,
            id_doctor: subject.doctor_id,
            doctor_verificado: subject.doctor_verified,
            id_paciente: subject.patient_id,
        },
    }))
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (Some(nombre), Some(apellido), Some(email), Some(password)) = (
        non_blank(req.nombre.as_deref()),
        non_blank(req.apellido.as_deref()),
        non_blank(req.email.as_deref()),
        non_blank(req.password.as_deref()),
    ) else {
        return Err(ApiError::validation("nombre, apellido, email and password are required"));
    };

    if repo::users::find_by_email(&state.db, email).await?.is_some() {
        return Err(ApiError::duplicate(
            "Email is already registered. To complete a doctor or patient profile use the profile endpoints",
        ));
    }

    let provided = headers.get(ADMIN_SECRET_HEADER).and_then(|v| v.to_str().ok());
    let role = resolve_register_role(req.rol, provided, state.admin_secret.as_deref());

    let password_hash = hash_password(password).map_err(ApiError::Internal)?;

    let user = repo::users::insert(
        &state.db,
        &NewUser {
            id_rol: role.id(),
            nombre: nombre.to_string(),
            apellido: apellido.to_string(),
            email: email.to_lowercase(),
            password_hash,
            telefono: req.telefono,
            direccion: req.direccion,
            fecha_nacimiento: req.fecha_nacimiento,
            genero: req.genero,
            numero_identificacion: req.numero_identificacion,
            tipo_identificacion: req.tipo_identificacion,
        },
    )
    .await
    .map_err(ApiError::from_write)?;

    tracing::info!(user_id = user.id_usuario, role = role.id(), "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: registration_message(role).into(),
            user: RegisteredUser {
                id: user.id_usuario,
                nombre: user.nombre,
                email: user.email,
                rol: role.id(),
            },
        }),
    ))
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = repo::users::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ProfileResponse { message: None, user }))
}

/// Only contact fields; email, password and role go through /usuarios.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let changes = UserChanges {
        nombre: req.nombre,
        apellido: req.apellido,
        telefono: req.telefono,
        direccion: req.direccion,
        ..UserChanges::default()
    };

    let user = repo::users::update(&state.db, auth.user_id, &changes)
        .await
        .map_err(ApiError::from_write)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ProfileResponse {
        message: Some("Profile updated".into()),
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_defaults_to_patient() {
        assert_eq!(resolve_register_role(None, None, Some("s3cret")), Role::Patient);
        assert_eq!(resolve_register_role(Some(3), None, None), Role::Patient);
        assert_eq!(resolve_register_role(Some(9), None, None), Role::Patient);
    }

    #[test]
    fn doctors_may_self_register() {
        assert_eq!(resolve_register_role(Some(2), None, None), Role::Doctor);
    }

    #[test]
    fn admin_requires_matching_secret() {
        assert_eq!(resolve_register_role(Some(1), Some("s3cret"), Some("s3cret")), Role::Admin);
        assert_eq!(resolve_register_role(Some(1), Some("guess"), Some("s3cret")), Role::Patient);
        assert_eq!(resolve_register_role(Some(1), None, Some("s3cret")), Role::Patient);
        // unset secret disables admin self-registration entirely
        assert_eq!(resolve_register_role(Some(1), Some(""), None), Role::Patient);
        assert_eq!(resolve_register_role(Some(1), Some(""), Some("")), Role::Patient);
    }
}
