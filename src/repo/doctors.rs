// src/repo/doctors.rs

use chrono::NaiveTime;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use crate::models::{USER_ACTIVE, USER_INACTIVE, VerificationStatus};

/// Doctor profile joined with the owning user's contact fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DoctorRow {
    pub id_doctor: i32,
    pub id_usuario: i32,
    pub especialidad: Option<String>,
    pub numero_licencia: Option<String>,
    pub consulta_duracion_minutos: i32,
    pub biografia: Option<String>,
    pub estado_verificacion: String,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub telefono: Option<String>,
    pub estado: String,
}

/// Just enough to authorize a doctor caller.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DoctorIdentity {
    pub id_doctor: i32,
    pub estado_verificacion: String,
}

impl DoctorIdentity {
    pub fn status(&self) -> VerificationStatus {
        VerificationStatus::parse(&self.estado_verificacion).unwrap_or(VerificationStatus::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub id_usuario: i32,
    pub especialidad: Option<String>,
    pub numero_licencia: Option<String>,
    pub consulta_duracion_minutos: Option<i32>,
    pub biografia: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorChanges {
    pub especialidad: Option<String>,
    pub numero_licencia: Option<String>,
    pub consulta_duracion_minutos: Option<i32>,
    pub biografia: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id_horario: i32,
    pub id_doctor: i32,
    pub id_centro: Option<i32>,
    pub dia_semana: i16,
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
    pub activo: bool,
}

const SELECT_DOCTOR: &str = r#"
    SELECT d.id_doctor, d.id_usuario, d.especialidad, d.numero_licencia,
           d.consulta_duracion_minutos, d.biografia, d.estado_verificacion,
           u.nombre, u.apellido, u.email, u.telefono, u.estado
    FROM doctores d
    JOIN usuarios u ON u.id_usuario = d.id_usuario
"#;

/// Active doctors; `include_unapproved` also returns pending and rejected profiles.
pub async fn list(db: &PgPool, include_unapproved: bool) -> Result<Vec<DoctorRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_DOCTOR}
         WHERE u.estado = $1
           AND ($2 OR d.estado_verificacion = 'Aprobado')
         ORDER BY u.apellido, u.nombre"
    );
    sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(USER_ACTIVE)
        .bind(include_unapproved)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(
    db: impl PgExecutor<'_>,
    id: i32,
) -> Result<Option<DoctorRow>, sqlx::Error> {
    let sql = format!("{SELECT_DOCTOR} WHERE d.id_doctor = $1");
    sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn identity_for_user(
    db: &PgPool,
    user_id: i32,
) -> Result<Option<DoctorIdentity>, sqlx::Error> {
    sqlx::query_as::<_, DoctorIdentity>(
        r#"
        SELECT id_doctor, estado_verificacion
        FROM doctores
        WHERE id_usuario = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn license_taken(
    db: impl PgExecutor<'_>,
    license: &str,
    except_doctor: Option<i32>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM doctores
            WHERE numero_licencia = $1
              AND ($2::int IS NULL OR id_doctor <> $2)
        )
        "#,
    )
    .bind(license)
    .bind(except_doctor)
    .fetch_one(db)
    .await
}

pub async fn has_profile(db: impl PgExecutor<'_>, user_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS (SELECT 1 FROM doctores WHERE id_usuario = $1)"#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}

/// New profiles always start unverified.
pub async fn insert(db: impl PgExecutor<'_>, doctor: &NewDoctor) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO doctores (
            id_usuario, especialidad, numero_licencia, consulta_duracion_minutos,
            biografia, estado_verificacion
        )
        VALUES ($1, $2, $3, COALESCE($4, 30), $5, $6)
        RETURNING id_doctor
        "#,
    )
    .bind(doctor.id_usuario)
    .bind(&doctor.especialidad)
    .bind(&doctor.numero_licencia)
    .bind(doctor.consulta_duracion_minutos)
    .bind(&doctor.biografia)
    .bind(VerificationStatus::Pending.as_str())
    .fetch_one(db)
    .await
}

pub async fn update(
    db: impl PgExecutor<'_>,
    id: i32,
    changes: &DoctorChanges,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE doctores
        SET especialidad              = COALESCE($2, especialidad),
            numero_licencia           = COALESCE($3, numero_licencia),
            consulta_duracion_minutos = COALESCE($4, consulta_duracion_minutos),
            biografia                 = COALESCE($5, biografia)
        WHERE id_doctor = $1
        "#,
    )
    .bind(id)
    .bind(&changes.especialidad)
    .bind(&changes.numero_licencia)
    .bind(changes.consulta_duracion_minutos)
    .bind(&changes.biografia)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_verification(
    db: &PgPool,
    id: i32,
    status: VerificationStatus,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"UPDATE doctores SET estado_verificacion = $2 WHERE id_doctor = $1"#)
        .bind(id)
        .bind(status.as_str())
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
        FROM doctores d
        WHERE d.id_doctor = $1 AND d.id_usuario = u.id_usuario
        "#,
    )
    .bind(id)
    .bind(USER_INACTIVE)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn schedules(db: &PgPool, doctor_id: i32) -> Result<Vec<ScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id_horario, id_doctor, id_centro, dia_semana, hora_inicio, hora_fin, activo
        FROM horarios_doctores
        WHERE id_doctor = $1
        ORDER BY dia_semana, hora_inicio
        "#,
    )
    .bind(doctor_id)
    .fetch_all(db)
    .await
}

pub async fn by_center(db: &PgPool, center_id: i32) -> Result<Vec<DoctorRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_DOCTOR}
         JOIN doctor_centro dc ON dc.id_doctor = d.id_doctor
         WHERE dc.id_centro = $1 AND u.estado = $2
         ORDER BY u.apellido, u.nombre"
    );
    sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(center_id)
        .bind(USER_ACTIVE)
        .fetch_all(db)
        .await
}

/// Approved doctors explicitly assigned to a patient.
pub async fn assigned_to_patient(
    db: &PgPool,
    patient_id: i32,
) -> Result<Vec<DoctorRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_DOCTOR}
         JOIN doctor_paciente dp ON dp.id_doctor = d.id_doctor
         WHERE dp.id_paciente = $1
           AND u.estado = $2
           AND d.estado_verificacion = 'Aprobado'
         ORDER BY u.apellido, u.nombre"
    );
    sqlx::query_as::<_, DoctorRow>(&sql)
        .bind(patient_id)
        .bind(USER_ACTIVE)
        .fetch_all(db)
        .await
}
