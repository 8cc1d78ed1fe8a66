// src/repo/assignments.rs
//
// Explicit doctor-patient links (doctor_paciente). Older databases may lack
// the table; readers treat errors here as "no assignment".

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id_doctor: i32,
    pub id_paciente: i32,
    pub fecha_asignacion: DateTime<Utc>,
}

pub async fn exists(db: &PgPool, doctor_id: i32, patient_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM doctor_paciente
            WHERE id_doctor = $1 AND id_paciente = $2
        )
        "#,
    )
    .bind(doctor_id)
    .bind(patient_id)
    .fetch_one(db)
    .await
}

/// Idempotent: an existing link is returned unchanged.
pub async fn assign(
    db: &PgPool,
    doctor_id: i32,
    patient_id: i32,
) -> Result<AssignmentRow, sqlx::Error> {
    sqlx::query_as::<_, AssignmentRow>(
        r#"
        WITH ins AS (
            INSERT INTO doctor_paciente (id_doctor, id_paciente)
            VALUES ($1, $2)
            ON CONFLICT (id_doctor, id_paciente) DO NOTHING
            RETURNING id_doctor, id_paciente, fecha_asignacion
        )
        SELECT id_doctor, id_paciente, fecha_asignacion FROM ins
        UNION ALL
        SELECT id_doctor, id_paciente, fecha_asignacion
        FROM doctor_paciente
        WHERE id_doctor = $1 AND id_paciente = $2
        LIMIT 1
        "#,
    )
    .bind(doctor_id)
    .bind(patient_id)
    .fetch_one(db)
    .await
}

pub async fn unassign(db: &PgPool, doctor_id: i32, patient_id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM doctor_paciente WHERE id_doctor = $1 AND id_paciente = $2"#)
        .bind(doctor_id)
        .bind(patient_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
