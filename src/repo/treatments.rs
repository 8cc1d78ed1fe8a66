// src/repo/treatments.rs
//
// Treatments hang off a consultation; patient and doctor come from there.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::scope_filters;
use crate::models::{TREATMENT_ACTIVE, TREATMENT_CANCELLED};
use crate::policy::ListScope;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TreatmentRow {
    pub id_tratamiento: i32,
    pub id_consulta: i32,
    pub tipo_tratamiento: String,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub dosis: Option<String>,
    pub frecuencia: Option<String>,
    pub duracion: Option<String>,
    pub instrucciones_especiales: Option<String>,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: Option<NaiveDate>,
    pub estado: String,
    pub fecha_consulta: DateTime<Utc>,
    pub id_paciente: i32,
    pub id_doctor: i32,
    pub nombre_paciente: String,
    pub nombre_doctor: String,
}

#[derive(Debug, Clone, Default)]
pub struct TreatmentFields {
    pub id_consulta: Option<i32>,
    pub tipo_tratamiento: Option<String>,
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub dosis: Option<String>,
    pub frecuencia: Option<String>,
    pub duracion: Option<String>,
    pub instrucciones_especiales: Option<String>,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub estado: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FollowUpRow {
    pub id_seguimiento: i32,
    pub id_tratamiento: i32,
    pub fecha_seguimiento: DateTime<Utc>,
    pub cumplimiento: String,
    pub efectos_secundarios: Option<String>,
    pub efectividad: String,
    pub observaciones: Option<String>,
    pub id_doctor: Option<i32>,
    pub nombre_doctor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FollowUpFields {
    pub fecha_seguimiento: Option<DateTime<Utc>>,
    pub cumplimiento: Option<String>,
    pub efectos_secundarios: Option<String>,
    pub efectividad: Option<String>,
    pub observaciones: Option<String>,
}

const SELECT_TREATMENT: &str = r#"
    SELECT t.id_tratamiento, t.id_consulta, t.tipo_tratamiento, t.nombre,
           t.descripcion, t.dosis, t.frecuencia, t.duracion,
           t.instrucciones_especiales, t.fecha_inicio, t.fecha_fin, t.estado,
           c.fecha_consulta, c.id_paciente, c.id_doctor,
           CONCAT(up.nombre, ' ', up.apellido) AS nombre_paciente,
           CONCAT(ud.nombre, ' ', ud.apellido) AS nombre_doctor
    FROM tratamientos t
    JOIN consultas c ON c.id_consulta = t.id_consulta
    JOIN pacientes p ON p.id_paciente = c.id_paciente
    JOIN usuarios up ON up.id_usuario = p.id_usuario
    JOIN doctores d ON d.id_doctor = c.id_doctor
    JOIN usuarios ud ON ud.id_usuario = d.id_usuario
"#;

const SELECT_FOLLOW_UP: &str = r#"
    SELECT s.id_seguimiento, s.id_tratamiento, s.fecha_seguimiento, s.cumplimiento,
           s.efectos_secundarios, s.efectividad, s.observaciones, s.id_doctor,
           CASE WHEN u.id_usuario IS NULL THEN NULL
                ELSE CONCAT(u.nombre, ' ', u.apellido) END AS nombre_doctor
    FROM seguimiento_tratamientos s
    LEFT JOIN doctores d ON d.id_doctor = s.id_doctor
    LEFT JOIN usuarios u ON u.id_usuario = d.id_usuario
"#;

pub async fn list(db: &PgPool, scope: ListScope) -> Result<Vec<TreatmentRow>, sqlx::Error> {
    let Some((doctor, patient)) = scope_filters(scope) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "{SELECT_TREATMENT}
         WHERE ($1::int IS NULL OR c.id_doctor = $1)
           AND ($2::int IS NULL OR c.id_paciente = $2)
         ORDER BY t.fecha_inicio DESC, t.id_tratamiento DESC"
    );
    sqlx::query_as::<_, TreatmentRow>(&sql)
        .bind(doctor)
        .bind(patient)
        .fetch_all(db)
        .await
}

pub async fn active_for_patient(db: &PgPool, patient_id: i32) -> Result<Vec<TreatmentRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_TREATMENT}
         WHERE c.id_paciente = $1 AND t.estado = $2
         ORDER BY t.fecha_inicio DESC"
    );
    sqlx::query_as::<_, TreatmentRow>(&sql)
        .bind(patient_id)
        .bind(TREATMENT_ACTIVE)
        .fetch_all(db)
        .await
}

pub async fn by_consultation(db: &PgPool, consultation_id: i32) -> Result<Vec<TreatmentRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_TREATMENT}
         WHERE t.id_consulta = $1
         ORDER BY t.fecha_inicio DESC, t.id_tratamiento DESC"
    );
    sqlx::query_as::<_, TreatmentRow>(&sql)
        .bind(consultation_id)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<TreatmentRow>, sqlx::Error> {
    let sql = format!("{SELECT_TREATMENT} WHERE t.id_tratamiento = $1");
    sqlx::query_as::<_, TreatmentRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// `id_consulta`, `tipo_tratamiento` and `nombre` must be present; the handler checks.
pub async fn insert(db: &PgPool, t: &TreatmentFields) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO tratamientos (
            id_consulta, tipo_tratamiento, nombre, descripcion, dosis, frecuencia,
            duracion, instrucciones_especiales, fecha_inicio, fecha_fin, estado
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,COALESCE($9, CURRENT_DATE),$10,COALESCE($11, $12))
        RETURNING id_tratamiento
        "#,
    )
    .bind(t.id_consulta)
    .bind(&t.tipo_tratamiento)
    .bind(&t.nombre)
    .bind(&t.descripcion)
    .bind(&t.dosis)
    .bind(&t.frecuencia)
    .bind(&t.duracion)
    .bind(&t.instrucciones_especiales)
    .bind(t.fecha_inicio)
    .bind(t.fecha_fin)
    .bind(&t.estado)
    .bind(TREATMENT_ACTIVE)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, t: &TreatmentFields) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE tratamientos
        SET tipo_tratamiento         = COALESCE($2, tipo_tratamiento),
            nombre                   = COALESCE($3, nombre),
            descripcion              = COALESCE($4, descripcion),
            dosis                    = COALESCE($5, dosis),
            frecuencia               = COALESCE($6, frecuencia),
            duracion                 = COALESCE($7, duracion),
            instrucciones_especiales = COALESCE($8, instrucciones_especiales),
            fecha_inicio             = COALESCE($9, fecha_inicio),
            fecha_fin                = COALESCE($10, fecha_fin),
            estado                   = COALESCE($11, estado)
        WHERE id_tratamiento = $1
        "#,
    )
    .bind(id)
    .bind(&t.tipo_tratamiento)
    .bind(&t.nombre)
    .bind(&t.descripcion)
    .bind(&t.dosis)
    .bind(&t.frecuencia)
    .bind(&t.duracion)
    .bind(&t.instrucciones_especiales)
    .bind(t.fecha_inicio)
    .bind(t.fecha_fin)
    .bind(&t.estado)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Soft delete.
pub async fn cancel(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"UPDATE tratamientos SET estado = $2 WHERE id_tratamiento = $1"#)
        .bind(id)
        .bind(TREATMENT_CANCELLED)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/* -------------------------
   Follow-ups
--------------------------*/

pub async fn follow_ups(db: &PgPool, treatment_id: i32) -> Result<Vec<FollowUpRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_FOLLOW_UP}
         WHERE s.id_tratamiento = $1
         ORDER BY s.fecha_seguimiento DESC"
    );
    sqlx::query_as::<_, FollowUpRow>(&sql)
        .bind(treatment_id)
        .fetch_all(db)
        .await
}

pub async fn find_follow_up(db: &PgPool, id: i32) -> Result<Option<FollowUpRow>, sqlx::Error> {
    let sql = format!("{SELECT_FOLLOW_UP} WHERE s.id_seguimiento = $1");
    sqlx::query_as::<_, FollowUpRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// `doctor_id` is the recording doctor, `None` when an admin records it.
pub async fn insert_follow_up(
    db: &PgPool,
    treatment_id: i32,
    doctor_id: Option<i32>,
    f: &FollowUpFields,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO seguimiento_tratamientos (
            id_tratamiento, fecha_seguimiento, cumplimiento, efectos_secundarios,
            efectividad, observaciones, id_doctor
        )
        VALUES ($1, COALESCE($2, now()), $3, $4, $5, $6, $7)
        RETURNING id_seguimiento
        "#,
    )
    .bind(treatment_id)
    .bind(f.fecha_seguimiento)
    .bind(&f.cumplimiento)
    .bind(&f.efectos_secundarios)
    .bind(&f.efectividad)
    .bind(&f.observaciones)
    .bind(doctor_id)
    .fetch_one(db)
    .await
}

pub async fn update_follow_up(db: &PgPool, id: i32, f: &FollowUpFields) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE seguimiento_tratamientos
        SET fecha_seguimiento   = COALESCE($2, fecha_seguimiento),
            cumplimiento        = COALESCE($3, cumplimiento),
            efectos_secundarios = COALESCE($4, efectos_secundarios),
            efectividad         = COALESCE($5, efectividad),
            observaciones       = COALESCE($6, observaciones)
        WHERE id_seguimiento = $1
        "#,
    )
    .bind(id)
    .bind(f.fecha_seguimiento)
    .bind(&f.cumplimiento)
    .bind(&f.efectos_secundarios)
    .bind(&f.efectividad)
    .bind(&f.observaciones)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_follow_up(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM seguimiento_tratamientos WHERE id_seguimiento = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
