// src/repo/appointments.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::scope_filters;
use crate::models::AppointmentStatus;
use crate::policy::ListScope;
use crate::scheduling::TimeRange;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id_cita: i32,
    pub id_paciente: i32,
    pub id_doctor: i32,
    pub id_centro: i32,
    pub fecha: NaiveDate,
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
    pub estado: String,
    pub tipo_cita: Option<String>,
    pub motivo: Option<String>,
    pub notas_previas: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_modificacion: Option<DateTime<Utc>>,
    pub nombre_paciente: String,
    pub nombre_doctor: String,
    pub centro_nombre: String,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub id_paciente: i32,
    pub id_doctor: i32,
    pub id_centro: i32,
    pub fecha: NaiveDate,
    pub slot: TimeRange,
    pub estado: AppointmentStatus,
    pub tipo_cita: Option<String>,
    pub motivo: Option<String>,
    pub notas_previas: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub id_paciente: Option<i32>,
    pub id_doctor: Option<i32>,
    pub id_centro: Option<i32>,
    pub fecha: Option<NaiveDate>,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub estado: Option<AppointmentStatus>,
    pub tipo_cita: Option<String>,
    pub motivo: Option<String>,
    pub notas_previas: Option<String>,
}

const SELECT_APPOINTMENT: &str = r#"
    SELECT c.id_cita, c.id_paciente, c.id_doctor, c.id_centro, c.fecha,
           c.hora_inicio, c.hora_fin, c.estado, c.tipo_cita, c.motivo,
           c.notas_previas, c.fecha_creacion, c.fecha_modificacion,
           CONCAT(up.nombre, ' ', up.apellido) AS nombre_paciente,
           CONCAT(ud.nombre, ' ', ud.apellido) AS nombre_doctor,
           cm.nombre AS centro_nombre
    FROM citas c
    JOIN pacientes p ON p.id_paciente = c.id_paciente
    JOIN usuarios up ON up.id_usuario = p.id_usuario
    JOIN doctores d ON d.id_doctor = c.id_doctor
    JOIN usuarios ud ON ud.id_usuario = d.id_usuario
    JOIN centros_medicos cm ON cm.id_centro = c.id_centro
"#;

pub async fn list(db: &PgPool, scope: ListScope) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let Some((doctor, patient)) = scope_filters(scope) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "{SELECT_APPOINTMENT}
         WHERE ($1::int IS NULL OR c.id_doctor = $1)
           AND ($2::int IS NULL OR c.id_paciente = $2)
         ORDER BY c.fecha DESC, c.hora_inicio DESC"
    );
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(doctor)
        .bind(patient)
        .fetch_all(db)
        .await
}

/// Pending or confirmed appointments from today on, soonest first.
pub async fn upcoming(db: &PgPool, scope: ListScope) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let Some((doctor, patient)) = scope_filters(scope) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "{SELECT_APPOINTMENT}
         WHERE ($1::int IS NULL OR c.id_doctor = $1)
           AND ($2::int IS NULL OR c.id_paciente = $2)
           AND c.fecha >= CURRENT_DATE
           AND c.estado IN ('Pendiente', 'Confirmada')
         ORDER BY c.fecha, c.hora_inicio"
    );
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(doctor)
        .bind(patient)
        .fetch_all(db)
        .await
}

/// Next `limit` open appointments of one patient (dashboard).
pub async fn next_for_patient(
    db: &PgPool,
    patient_id: i32,
    limit: i64,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_APPOINTMENT}
         WHERE c.id_paciente = $1
           AND c.fecha >= CURRENT_DATE
           AND c.estado IN ('Pendiente', 'Confirmada')
         ORDER BY c.fecha, c.hora_inicio
         LIMIT $2"
    );
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(patient_id)
        .bind(limit)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<AppointmentRow>, sqlx::Error> {
    let sql = format!("{SELECT_APPOINTMENT} WHERE c.id_cita = $1");
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Number of calendar-blocking appointments of `doctor_id` on `fecha`
/// overlapping `slot`, ignoring `exclude` (the appointment being edited).
pub async fn count_overlapping(
    db: &PgPool,
    doctor_id: i32,
    fecha: NaiveDate,
    slot: &TimeRange,
    exclude: Option<i32>,
) -> Result<i64, sqlx::Error> {
    let blocking: Vec<&str> = AppointmentStatus::ALL
        .into_iter()
        .filter(|s| s.blocks_schedule())
        .map(AppointmentStatus::as_str)
        .collect();
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM citas
        WHERE id_doctor = $1
          AND fecha = $2
          AND estado = ANY($5)
          AND ($6::int IS NULL OR id_cita <> $6)
          AND (
                (hora_inicio <= $3 AND hora_fin > $3)
             OR (hora_inicio < $4 AND hora_fin >= $4)
             OR (hora_inicio >= $3 AND hora_fin <= $4)
          )
        "#,
    )
    .bind(doctor_id)
    .bind(fecha)
    .bind(slot.start)
    .bind(slot.end)
    .bind(blocking)
    .bind(exclude)
    .fetch_one(db)
    .await
}

pub async fn insert(db: &PgPool, a: &NewAppointment) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO citas (
            id_paciente, id_doctor, id_centro, fecha, hora_inicio, hora_fin,
            estado, tipo_cita, motivo, notas_previas
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        RETURNING id_cita
        "#,
    )
    .bind(a.id_paciente)
    .bind(a.id_doctor)
    .bind(a.id_centro)
    .bind(a.fecha)
    .bind(a.slot.start)
    .bind(a.slot.end)
    .bind(a.estado.as_str())
    .bind(&a.tipo_cita)
    .bind(&a.motivo)
    .bind(&a.notas_previas)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, c: &AppointmentChanges) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE citas
        SET id_paciente        = COALESCE($2, id_paciente),
            id_doctor          = COALESCE($3, id_doctor),
            id_centro          = COALESCE($4, id_centro),
            fecha              = COALESCE($5, fecha),
            hora_inicio        = COALESCE($6, hora_inicio),
            hora_fin           = COALESCE($7, hora_fin),
            estado             = COALESCE($8, estado),
            tipo_cita          = COALESCE($9, tipo_cita),
            motivo             = COALESCE($10, motivo),
            notas_previas      = COALESCE($11, notas_previas),
            fecha_modificacion = now()
        WHERE id_cita = $1
        "#,
    )
    .bind(id)
    .bind(c.id_paciente)
    .bind(c.id_doctor)
    .bind(c.id_centro)
    .bind(c.fecha)
    .bind(c.hora_inicio)
    .bind(c.hora_fin)
    .bind(c.estado.map(AppointmentStatus::as_str))
    .bind(&c.tipo_cita)
    .bind(&c.motivo)
    .bind(&c.notas_previas)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Soft delete.
pub async fn cancel(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE citas SET estado = $2, fecha_modificacion = now()
        WHERE id_cita = $1
        "#,
    )
    .bind(id)
    .bind(AppointmentStatus::Cancelled.as_str())
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}
