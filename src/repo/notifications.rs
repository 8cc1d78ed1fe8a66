// src/repo/notifications.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub id_notificacion: i32,
    pub id_usuario_destino: i32,
    pub tipo_notificacion: String,
    pub titulo: String,
    pub mensaje: String,
    pub entidad_relacionada: Option<String>,
    pub id_entidad: Option<i32>,
    pub leida: bool,
    pub fecha_envio: DateTime<Utc>,
    pub fecha_lectura: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id_usuario_destino: i32,
    pub tipo_notificacion: String,
    pub titulo: String,
    pub mensaje: String,
    pub entidad_relacionada: Option<String>,
    pub id_entidad: Option<i32>,
}

pub async fn list_for_user(
    db: &PgPool,
    user_id: i32,
    unread_only: bool,
) -> Result<Vec<NotificationRow>, sqlx::Error> {
    sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT * FROM notificaciones
        WHERE id_usuario_destino = $1
          AND (NOT $2 OR leida = false)
        ORDER BY fecha_envio DESC
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_all(db)
    .await
}

pub async fn unread_count(db: &PgPool, user_id: i32) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM notificaciones WHERE id_usuario_destino = $1 AND leida = false"#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<NotificationRow>, sqlx::Error> {
    sqlx::query_as::<_, NotificationRow>(r#"SELECT * FROM notificaciones WHERE id_notificacion = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn mark_read(db: &PgPool, id: i32) -> Result<Option<NotificationRow>, sqlx::Error> {
    sqlx::query_as::<_, NotificationRow>(
        r#"
        UPDATE notificaciones
        SET leida = true, fecha_lectura = COALESCE(fecha_lectura, now())
        WHERE id_notificacion = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Returns how many notifications changed.
pub async fn mark_all_read(db: &PgPool, user_id: i32) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE notificaciones
        SET leida = true, fecha_lectura = now()
        WHERE id_usuario_destino = $1 AND leida = false
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

pub async fn delete(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM notificaciones WHERE id_notificacion = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn insert(db: impl PgExecutor<'_>, n: &NewNotification) -> Result<NotificationRow, sqlx::Error> {
    sqlx::query_as::<_, NotificationRow>(
        r#"
        INSERT INTO notificaciones (
            id_usuario_destino, tipo_notificacion, titulo, mensaje,
            entidad_relacionada, id_entidad
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(n.id_usuario_destino)
    .bind(&n.tipo_notificacion)
    .bind(&n.titulo)
    .bind(&n.mensaje)
    .bind(&n.entidad_relacionada)
    .bind(n.id_entidad)
    .fetch_one(db)
    .await
}
