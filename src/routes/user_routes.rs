// src/routes/user_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::{
        access::{require_admin, require_self_or_admin},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, Role, USER_ACTIVE, USER_INACTIVE, non_blank},
    repo::{self, users::{NewUser, UserChanges, UserRow}},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id_rol: Option<i32>,
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
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub id_rol: Option<i32>,
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
    pub estado: Option<String>,
}

impl UpdateUserRequest {
    /// Non-admins keep only their contact fields; everything else is dropped silently.
    fn into_changes(self, is_admin: bool) -> Result<UserChanges, ApiError> {
        let mut changes = UserChanges {
            nombre: self.nombre,
            apellido: self.apellido,
            telefono: self.telefono,
            direccion: self.direccion,
            ..UserChanges::default()
        };
        if !is_admin {
            return Ok(changes);
        }

        if let Some(role) = self.id_rol {
            Role::try_from(role).map_err(ApiError::validation)?;
            changes.id_rol = Some(role);
        }
        if let Some(estado) = self.estado.as_deref() {
            if estado != USER_ACTIVE && estado != USER_INACTIVE {
                return Err(ApiError::validation("estado must be Activo or Inactivo"));
            }
            changes.estado = Some(estado.to_string());
        }
        if let Some(password) = non_blank(self.password.as_deref()) {
            changes.password_hash = Some(hash_password(password).map_err(ApiError::Internal)?);
        }
        changes.email = non_blank(self.email.as_deref()).map(str::to_lowercase);
        changes.fecha_nacimiento = self.fecha_nacimiento;
        changes.genero = self.genero;
        changes.numero_identificacion = self.numero_identificacion;
        changes.tipo_identificacion = self.tipo_identificacion;
        Ok(changes)
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserRow>>>, ApiError> {
    require_admin(&auth)?;
    let users = repo::users::list(&state.db).await?;
    Ok(Json(ApiOk::data(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<UserRow>>, ApiError> {
    require_self_or_admin(&auth, id)?;
    let user = repo::users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(ApiOk::data(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiOk<UserRow>>), ApiError> {
    require_admin(&auth)?;

    let (Some(nombre), Some(apellido), Some(email), Some(password)) = (
        non_blank(req.nombre.as_deref()),
        non_blank(req.apellido.as_deref()),
        non_blank(req.email.as_deref()),
        non_blank(req.password.as_deref()),
    ) else {
        return Err(ApiError::validation("nombre, apellido, email and password are required"));
    };
    let role = match req.id_rol {
        Some(id) => Role::try_from(id).map_err(ApiError::validation)?,
        None => Role::Patient,
    };

    if repo::users::find_by_email(&state.db, email).await?.is_some() {
        return Err(ApiError::duplicate("Email is already registered"));
    }

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

    tracing::info!(user_id = user.id_usuario, created_by = auth.user_id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("User created", user)),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserRow>>, ApiError> {
    require_self_or_admin(&auth, id)?;

    let changes = req.into_changes(auth.is_admin())?;
    let user = repo::users::update(&state.db, id, &changes)
        .await
        .map_err(ApiError::from_write)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ApiOk::with_message("User updated", user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_admin(&auth)?;
    repo::users::deactivate(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(user_id = id, "user deactivated");
    Ok(Json(ApiOk::message("User deactivated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpdateUserRequest {
        UpdateUserRequest {
            id_rol: Some(1),
            nombre: Some("Ana".into()),
            email: Some("Ana@Example.com".into()),
            estado: Some("Inactivo".into()),
            telefono: Some("555".into()),
            ..UpdateUserRequest::default()
        }
    }

    #[test]
    fn non_admin_changes_are_limited_to_contact_fields() {
        let changes = request().into_changes(false).unwrap();
        assert_eq!(changes.nombre.as_deref(), Some("Ana"));
        assert_eq!(changes.telefono.as_deref(), Some("555"));
        assert!(changes.id_rol.is_none());
        assert!(changes.email.is_none());
        assert!(changes.estado.is_none());
        assert!(changes.password_hash.is_none());
    }

    #[test]
    fn admin_may_change_role_email_and_status() {
        let changes = request().into_changes(true).unwrap();
        assert_eq!(changes.id_rol, Some(1));
        assert_eq!(changes.email.as_deref(), Some("ana@example.com"));
        assert_eq!(changes.estado.as_deref(), Some("Inactivo"));
    }

    #[test]
    fn admin_updates_are_validated() {
        let bad_role = UpdateUserRequest { id_rol: Some(7), ..UpdateUserRequest::default() };
        assert!(matches!(bad_role.into_changes(true), Err(ApiError::BadRequest(..))));

        let bad_state = UpdateUserRequest { estado: Some("Borrado".into()), ..UpdateUserRequest::default() };
        assert!(matches!(bad_state.into_changes(true), Err(ApiError::BadRequest(..))));
    }
}
