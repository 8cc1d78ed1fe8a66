// src/repo/patients.rs

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use crate::models::{DEFAULT_RISK_LEVEL, USER_ACTIVE, USER_INACTIVE};

/// Patient profile joined with the owning user's identity fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientRow {
    pub id_paciente: i32,
    pub id_usuario: i32,
    pub id_doctor_principal: Option<i32>,
    pub tipo_sangre: Option<String>,
    pub peso: Option<f64>,
    pub altura: Option<f64>,
    pub alergias: Option<String>,
    pub fecha_diagnostico_diabetes: Option<NaiveDate>,
    pub tipo_diabetes: Option<String>,
    pub nivel_riesgo: String,
    pub observaciones: Option<String>,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub telefono: Option<String>,
    pub genero: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub estado: String,
}

/// Clinical fields shared by profile creation and updates.
#[derive(Debug, Clone, Default)]
pub struct PatientFields {
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

const SELECT_PATIENT: &str = r#"
    SELECT p.id_paciente, p.id_usuario, p.id_doctor_principal, p.tipo_sangre,
           p.peso, p.altura, p.alergias, p.fecha_diagnostico_diabetes,
           p.tipo_diabetes, p.nivel_riesgo, p.observaciones,
           u.nombre, u.apellido, u.email, u.telefono, u.genero,
           u.fecha_nacimiento, u.estado
    FROM pacientes p
    JOIN usuarios u ON u.id_usuario = p.id_usuario
"#;

pub async fn list_active(db: &PgPool) -> Result<Vec<PatientRow>, sqlx::Error> {
    let sql = format!("{SELECT_PATIENT} WHERE u.estado = $1 ORDER BY u.apellido, u.nombre");
    sqlx::query_as::<_, PatientRow>(&sql)
        .bind(USER_ACTIVE)
        .fetch_all(db)
        .await
}

/// Returns the row regardless of account status.
pub async fn find_by_id(
    db: impl PgExecutor<'_>,
    id: i32,
) -> Result<Option<PatientRow>, sqlx::Error> {
    let sql = format!("{SELECT_PATIENT} WHERE p.id_paciente = $1");
    sqlx::query_as::<_, PatientRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn id_for_user(db: impl PgExecutor<'_>, user_id: i32) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(r#"SELECT id_paciente FROM pacientes WHERE id_usuario = $1"#)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn user_id_of(db: &PgPool, patient_id: i32) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(r#"SELECT id_usuario FROM pacientes WHERE id_paciente = $1"#)
        .bind(patient_id)
        .fetch_optional(db)
        .await
}

pub async fn primary_doctor_of(db: &PgPool, patient_id: i32) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i32>>(
        r#"SELECT id_doctor_principal FROM pacientes WHERE id_paciente = $1"#,
    )
    .bind(patient_id)
    .fetch_optional(db)
    .await
    .map(Option::flatten)
}

pub async fn insert(
    db: impl PgExecutor<'_>,
    user_id: i32,
    fields: &PatientFields,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO pacientes (
            id_usuario, id_doctor_principal, tipo_sangre, peso, altura, alergias,
            fecha_diagnostico_diabetes, tipo_diabetes, nivel_riesgo, observaciones
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,COALESCE($9, $10),$11)
        RETURNING id_paciente
        "#,
    )
    .bind(user_id)
    .bind(fields.id_doctor_principal)
    .bind(&fields.tipo_sangre)
    .bind(fields.peso)
    .bind(fields.altura)
    .bind(&fields.alergias)
    .bind(fields.fecha_diagnostico_diabetes)
    .bind(&fields.tipo_diabetes)
    .bind(&fields.nivel_riesgo)
    .bind(DEFAULT_RISK_LEVEL)
    .bind(&fields.observaciones)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: impl PgExecutor<'_>,
    id: i32,
    fields: &PatientFields,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE pacientes
        SET id_doctor_principal        = COALESCE($2, id_doctor_principal),
            tipo_sangre                = COALESCE($3, tipo_sangre),
            peso                       = COALESCE($4, peso),
            altura                     = COALESCE($5, altura),
            alergias                   = COALESCE($6, alergias),
            fecha_diagnostico_diabetes = COALESCE($7, fecha_diagnostico_diabetes),
            tipo_diabetes              = COALESCE($8, tipo_diabetes),
            nivel_riesgo               = COALESCE($9, nivel_riesgo),
            observaciones              = COALESCE($10, observaciones)
        WHERE id_paciente = $1
        "#,
    )
    .bind(id)
    .bind(fields.id_doctor_principal)
    .bind(&fields.tipo_sangre)
    .bind(fields.peso)
    .bind(fields.altura)
    .bind(&fields.alergias)
    .bind(fields.fecha_diagnostico_diabetes)
    .bind(&fields.tipo_diabetes)
    .bind(&fields.nivel_riesgo)
    .bind(&fields.observaciones)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Soft delete through the owning user account.
pub async fn deactivate(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE usuarios u
        SET estado = $2, fecha_modificacion = now()
        FROM pacientes p
        WHERE p.id_paciente = $1 AND p.id_usuario = u.id_usuario
        "#,
    )
    .bind(id)
    .bind(USER_INACTIVE)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Active patients whose primary doctor is `doctor_id`.
pub async fn with_primary_doctor(
    db: &PgPool,
    doctor_id: i32,
) -> Result<Vec<PatientRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_PATIENT}
         WHERE p.id_doctor_principal = $1 AND u.estado = $2
         ORDER BY u.apellido, u.nombre"
    );
    sqlx::query_as::<_, PatientRow>(&sql)
        .bind(doctor_id)
        .bind(USER_ACTIVE)
        .fetch_all(db)
        .await
}

/// Active patients linked to `doctor_id` through doctor_paciente.
pub async fn assigned_to_doctor(
    db: &PgPool,
    doctor_id: i32,
) -> Result<Vec<PatientRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_PATIENT}
         JOIN doctor_paciente dp ON dp.id_paciente = p.id_paciente
         WHERE dp.id_doctor = $1 AND u.estado = $2
         ORDER BY u.apellido, u.nombre"
    );
    sqlx::query_as::<_, PatientRow>(&sql)
        .bind(doctor_id)
        .bind(USER_ACTIVE)
        .fetch_all(db)
        .await
}
