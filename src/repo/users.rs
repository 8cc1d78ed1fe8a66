// src/repo/users.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use crate::models::USER_INACTIVE;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id_usuario: i32,
    pub id_rol: i32,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub genero: Option<String>,
    pub numero_identificacion: Option<String>,
    pub tipo_identificacion: Option<String>,
    pub estado: String,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_modificacion: Option<DateTime<Utc>>,
}

/// Insert payload; `password_hash` is already an Argon2 PHC string.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id_rol: i32,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub password_hash: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub genero: Option<String>,
    pub numero_identificacion: Option<String>,
    pub tipo_identificacion: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub id_rol: Option<i32>,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub genero: Option<String>,
    pub numero_identificacion: Option<String>,
    pub tipo_identificacion: Option<String>,
    pub estado: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.id_rol.is_none()
            && self.nombre.is_none()
            && self.apellido.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.telefono.is_none()
            && self.direccion.is_none()
            && self.fecha_nacimiento.is_none()
            && self.genero.is_none()
            && self.numero_identificacion.is_none()
            && self.tipo_identificacion.is_none()
            && self.estado.is_none()
    }
}

pub async fn list(db: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT *
        FROM usuarios
        ORDER BY apellido, nombre
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn find_by_id(db: impl PgExecutor<'_>, id: i32) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(r#"SELECT * FROM usuarios WHERE id_usuario = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Emails compare case-insensitively.
pub async fn find_by_email(
    db: impl PgExecutor<'_>,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(r#"SELECT * FROM usuarios WHERE lower(email) = lower($1)"#)
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn insert(db: impl PgExecutor<'_>, user: &NewUser) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO usuarios (
            id_rol, nombre, apellido, email, password, telefono, direccion,
            fecha_nacimiento, genero, numero_identificacion, tipo_identificacion
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING *
        "#,
    )
    .bind(user.id_rol)
    .bind(&user.nombre)
    .bind(&user.apellido)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.telefono)
    .bind(&user.direccion)
    .bind(user.fecha_nacimiento)
    .bind(&user.genero)
    .bind(&user.numero_identificacion)
    .bind(&user.tipo_identificacion)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: impl PgExecutor<'_>,
    id: i32,
    changes: &UserChanges,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE usuarios
        SET id_rol                = COALESCE($2, id_rol),
            nombre                = COALESCE($3, nombre),
            apellido              = COALESCE($4, apellido),
            email                 = COALESCE($5, email),
            password              = COALESCE($6, password),
            telefono              = COALESCE($7, telefono),
            direccion             = COALESCE($8, direccion),
            fecha_nacimiento      = COALESCE($9, fecha_nacimiento),
            genero                = COALESCE($10, genero),
            numero_identificacion = COALESCE($11, numero_identificacion),
            tipo_identificacion   = COALESCE($12, tipo_identificacion),
            estado                = COALESCE($13, estado),
            fecha_modificacion    = now()
        WHERE id_usuario = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.id_rol)
    .bind(&changes.nombre)
    .bind(&changes.apellido)
    .bind(&changes.email)
    .bind(&changes.password_hash)
    .bind(&changes.telefono)
    .bind(&changes.direccion)
    .bind(changes.fecha_nacimiento)
    .bind(&changes.genero)
    .bind(&changes.numero_identificacion)
    .bind(&changes.tipo_identificacion)
    .bind(&changes.estado)
    .fetch_optional(db)
    .await
}

pub async fn set_role(db: impl PgExecutor<'_>, id: i32, role_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE usuarios
        SET id_rol = $2, fecha_modificacion = now()
        WHERE id_usuario = $1 AND id_rol <> $2
        "#,
    )
    .bind(id)
    .bind(role_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Soft delete. Returns the row with its new status.
pub async fn deactivate(db: &PgPool, id: i32) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE usuarios
        SET estado = $2, fecha_modificacion = now()
        WHERE id_usuario = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(USER_INACTIVE)
    .fetch_optional(db)
    .await
}

pub async fn permission_names(db: &PgPool, role_id: i32) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.nombre_permiso
        FROM permisos p
        JOIN rol_permiso rp ON rp.id_permiso = p.id_permiso
        WHERE rp.id_rol = $1
        ORDER BY p.nombre_permiso
        "#,
    )
    .bind(role_id)
    .fetch_all(db)
    .await
}
