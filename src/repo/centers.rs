// src/repo/centers.rs

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::{CENTER_ACTIVE, CENTER_INACTIVE};
use crate::scheduling::deserialize_opt_time;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CenterRow {
    pub id_centro: i32,
    pub nombre: String,
    pub direccion: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub horario_apertura: Option<NaiveTime>,
    pub horario_cierre: Option<NaiveTime>,
    pub dias_servicio: Option<String>,
    pub tipo: Option<String>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub estado: String,
}

/// Request body for create and update; on update absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CenterFields {
    pub nombre: Option<String>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub horario_apertura: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub horario_cierre: Option<NaiveTime>,
    pub dias_servicio: Option<String>,
    pub tipo: Option<String>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CenterDoctorLink {
    pub id_centro: i32,
    pub id_doctor: i32,
}

pub async fn list_active(db: &PgPool) -> Result<Vec<CenterRow>, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(
        r#"
        SELECT * FROM centros_medicos
        WHERE estado = $1
        ORDER BY nombre
        "#,
    )
    .bind(CENTER_ACTIVE)
    .fetch_all(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<CenterRow>, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(r#"SELECT * FROM centros_medicos WHERE id_centro = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// `nombre` and `direccion` must be present; the handler checks.
pub async fn insert(db: &PgPool, c: &CenterFields) -> Result<CenterRow, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(
        r#"
        INSERT INTO centros_medicos (
            nombre, direccion, telefono, email, horario_apertura, horario_cierre,
            dias_servicio, tipo, latitud, longitud, estado
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,COALESCE($11, $12))
        RETURNING *
        "#,
    )
    .bind(&c.nombre)
    .bind(&c.direccion)
    .bind(&c.telefono)
    .bind(&c.email)
    .bind(c.horario_apertura)
    .bind(c.horario_cierre)
    .bind(&c.dias_servicio)
    .bind(&c.tipo)
    .bind(c.latitud)
    .bind(c.longitud)
    .bind(&c.estado)
    .bind(CENTER_ACTIVE)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, c: &CenterFields) -> Result<Option<CenterRow>, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(
        r#"
        UPDATE centros_medicos
        SET nombre           = COALESCE($2, nombre),
            direccion        = COALESCE($3, direccion),
            telefono         = COALESCE($4, telefono),
            email            = COALESCE($5, email),
            horario_apertura = COALESCE($6, horario_apertura),
            horario_cierre   = COALESCE($7, horario_cierre),
            dias_servicio    = COALESCE($8, dias_servicio),
            tipo             = COALESCE($9, tipo),
            latitud          = COALESCE($10, latitud),
            longitud         = COALESCE($11, longitud),
            estado           = COALESCE($12, estado)
        WHERE id_centro = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&c.nombre)
    .bind(&c.direccion)
    .bind(&c.telefono)
    .bind(&c.email)
    .bind(c.horario_apertura)
    .bind(c.horario_cierre)
    .bind(&c.dias_servicio)
    .bind(&c.tipo)
    .bind(c.latitud)
    .bind(c.longitud)
    .bind(&c.estado)
    .fetch_optional(db)
    .await
}

pub async fn deactivate(db: &PgPool, id: i32) -> Result<Option<CenterRow>, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(
        r#"
        UPDATE centros_medicos SET estado = $2
        WHERE id_centro = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(CENTER_INACTIVE)
    .fetch_optional(db)
    .await
}

/// Active centers a doctor works at.
pub async fn for_doctor(db: &PgPool, doctor_id: i32) -> Result<Vec<CenterRow>, sqlx::Error> {
    sqlx::query_as::<_, CenterRow>(
        r#"
        SELECT cm.*
        FROM centros_medicos cm
        JOIN doctor_centro dc ON dc.id_centro = cm.id_centro
        WHERE dc.id_doctor = $1 AND cm.estado = $2
        ORDER BY cm.nombre
        "#,
    )
    .bind(doctor_id)
    .bind(CENTER_ACTIVE)
    .fetch_all(db)
    .await
}

pub async fn assign_doctor(
    db: &PgPool,
    center_id: i32,
    doctor_id: i32,
) -> Result<CenterDoctorLink, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO doctor_centro (id_centro, id_doctor)
        VALUES ($1, $2)
        ON CONFLICT (id_doctor, id_centro) DO NOTHING
        "#,
    )
    .bind(center_id)
    .bind(doctor_id)
    .execute(db)
    .await?;

    Ok(CenterDoctorLink {
        id_centro: center_id,
        id_doctor: doctor_id,
    })
}

pub async fn unassign_doctor(db: &PgPool, center_id: i32, doctor_id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM doctor_centro WHERE id_centro = $1 AND id_doctor = $2"#)
        .bind(center_id)
        .bind(doctor_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
