// src/repo/consultations.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::scope_filters;
use crate::meeting::CALL_PENDING;
use crate::policy::ListScope;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConsultationRow {
    pub id_consulta: i32,
    pub id_cita: Option<i32>,
    pub id_videocita: Option<i32>,
    pub id_paciente: i32,
    pub id_doctor: i32,
    pub fecha_consulta: DateTime<Utc>,
    pub tipo_consulta: String,
    pub sintomas: Option<String>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub observaciones: Option<String>,
    pub recomendaciones: Option<String>,
    pub fecha_proxima_revision: Option<NaiveDate>,
    pub enlace_videollamada: Option<String>,
    pub estado_videollamada: Option<String>,
    pub fecha_modificacion: Option<DateTime<Utc>>,
    pub nombre_paciente: String,
    pub nombre_doctor: String,
}

/// Who a consultation belongs to; enough for record-level authorization.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ConsultationOwners {
    pub id_paciente: i32,
    pub id_doctor: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ConsultationFields {
    pub id_cita: Option<i32>,
    pub id_videocita: Option<i32>,
    pub id_paciente: Option<i32>,
    pub id_doctor: Option<i32>,
    pub fecha_consulta: Option<DateTime<Utc>>,
    pub tipo_consulta: Option<String>,
    pub sintomas: Option<String>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub observaciones: Option<String>,
    pub recomendaciones: Option<String>,
    pub fecha_proxima_revision: Option<NaiveDate>,
}

const SELECT_CONSULTATION: &str = r#"
    SELECT c.id_consulta, c.id_cita, c.id_videocita, c.id_paciente, c.id_doctor,
           c.fecha_consulta, c.tipo_consulta, c.sintomas, c.diagnostico,
           c.tratamiento, c.observaciones, c.recomendaciones,
           c.fecha_proxima_revision, c.enlace_videollamada, c.estado_videollamada,
           c.fecha_modificacion,
           CONCAT(up.nombre, ' ', up.apellido) AS nombre_paciente,
           CONCAT(ud.nombre, ' ', ud.apellido) AS nombre_doctor
    FROM consultas c
    JOIN pacientes p ON p.id_paciente = c.id_paciente
    JOIN usuarios up ON up.id_usuario = p.id_usuario
    JOIN doctores d ON d.id_doctor = c.id_doctor
    JOIN usuarios ud ON ud.id_usuario = d.id_usuario
"#;

pub async fn list(db: &PgPool, scope: ListScope) -> Result<Vec<ConsultationRow>, sqlx::Error> {
    let Some((doctor, patient)) = scope_filters(scope) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "{SELECT_CONSULTATION}
         WHERE ($1::int IS NULL OR c.id_doctor = $1)
           AND ($2::int IS NULL OR c.id_paciente = $2)
         ORDER BY c.fecha_consulta DESC"
    );
    sqlx::query_as::<_, ConsultationRow>(&sql)
        .bind(doctor)
        .bind(patient)
        .fetch_all(db)
        .await
}

/// Most recent `limit` consultations of one patient (dashboard).
pub async fn recent_for_patient(
    db: &PgPool,
    patient_id: i32,
    limit: i64,
) -> Result<Vec<ConsultationRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_CONSULTATION}
         WHERE c.id_paciente = $1
         ORDER BY c.fecha_consulta DESC
         LIMIT $2"
    );
    sqlx::query_as::<_, ConsultationRow>(&sql)
        .bind(patient_id)
        .bind(limit)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<ConsultationRow>, sqlx::Error> {
    let sql = format!("{SELECT_CONSULTATION} WHERE c.id_consulta = $1");
    sqlx::query_as::<_, ConsultationRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn owners(db: &PgPool, id: i32) -> Result<Option<ConsultationOwners>, sqlx::Error> {
    sqlx::query_as::<_, ConsultationOwners>(
        r#"SELECT id_paciente, id_doctor FROM consultas WHERE id_consulta = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// `id_paciente` and `id_doctor` must be present; the handler checks.
pub async fn insert(db: &PgPool, c: &ConsultationFields) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO consultas (
            id_cita, id_videocita, id_paciente, id_doctor, fecha_consulta,
            tipo_consulta, sintomas, diagnostico, tratamiento, observaciones,
            recomendaciones, fecha_proxima_revision
        )
        VALUES ($1,$2,$3,$4,COALESCE($5, now()),COALESCE($6, 'Presencial'),$7,$8,$9,$10,$11,$12)
        RETURNING id_consulta
        "#,
    )
    .bind(c.id_cita)
    .bind(c.id_videocita)
    .bind(c.id_paciente)
    .bind(c.id_doctor)
    .bind(c.fecha_consulta)
    .bind(&c.tipo_consulta)
    .bind(&c.sintomas)
    .bind(&c.diagnostico)
    .bind(&c.tratamiento)
    .bind(&c.observaciones)
    .bind(&c.recomendaciones)
    .bind(c.fecha_proxima_revision)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, c: &ConsultationFields) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE consultas
        SET fecha_consulta         = COALESCE($2, fecha_consulta),
            tipo_consulta          = COALESCE($3, tipo_consulta),
            sintomas               = COALESCE($4, sintomas),
            diagnostico            = COALESCE($5, diagnostico),
            tratamiento            = COALESCE($6, tratamiento),
            observaciones          = COALESCE($7, observaciones),
            recomendaciones        = COALESCE($8, recomendaciones),
            fecha_proxima_revision = COALESCE($9, fecha_proxima_revision),
            fecha_modificacion     = now()
        WHERE id_consulta = $1
        "#,
    )
    .bind(id)
    .bind(c.fecha_consulta)
    .bind(&c.tipo_consulta)
    .bind(&c.sintomas)
    .bind(&c.diagnostico)
    .bind(&c.tratamiento)
    .bind(&c.observaciones)
    .bind(&c.recomendaciones)
    .bind(c.fecha_proxima_revision)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Hard delete; treatments and foot evaluations cascade.
pub async fn delete(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM consultas WHERE id_consulta = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Stores a fresh meeting link and resets the call state.
pub async fn set_meeting_link(db: &PgPool, id: i32, link: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE consultas
        SET enlace_videollamada = $2, estado_videollamada = $3, fecha_modificacion = now()
        WHERE id_consulta = $1
        "#,
    )
    .bind(id)
    .bind(link)
    .bind(CALL_PENDING)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_call_state(db: &PgPool, id: i32, state: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE consultas
        SET estado_videollamada = $2, fecha_modificacion = now()
        WHERE id_consulta = $1
        "#,
    )
    .bind(id)
    .bind(state)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}
