// src/repo/lab_results.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LabResultRow {
    pub id_resultado: i32,
    pub id_paciente: i32,
    pub fecha_examen: NaiveDate,
    pub tipo_examen: String,
    pub resultados: JsonValue,
    pub valores_referencia: Option<JsonValue>,
    pub interpretacion: Option<String>,
    pub id_doctor_ordenante: Option<i32>,
    pub id_doctor_interpreta: Option<i32>,
    pub fecha_registro: DateTime<Utc>,
    pub nombre_paciente: String,
    pub nombre_doctor_ordenante: Option<String>,
    pub nombre_doctor_interpreta: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LabResultFields {
    pub id_paciente: Option<i32>,
    pub fecha_examen: Option<NaiveDate>,
    pub tipo_examen: Option<String>,
    pub resultados: Option<JsonValue>,
    pub valores_referencia: Option<JsonValue>,
    pub interpretacion: Option<String>,
    pub id_doctor_ordenante: Option<i32>,
    pub id_doctor_interpreta: Option<i32>,
}

const SELECT_RESULT: &str = r#"
    SELECT r.id_resultado, r.id_paciente, r.fecha_examen, r.tipo_examen,
           r.resultados, r.valores_referencia, r.interpretacion,
           r.id_doctor_ordenante, r.id_doctor_interpreta, r.fecha_registro,
           CONCAT(up.nombre, ' ', up.apellido) AS nombre_paciente,
           CASE WHEN uo.id_usuario IS NULL THEN NULL
                ELSE CONCAT(uo.nombre, ' ', uo.apellido) END AS nombre_doctor_ordenante,
           CASE WHEN ui.id_usuario IS NULL THEN NULL
                ELSE CONCAT(ui.nombre, ' ', ui.apellido) END AS nombre_doctor_interpreta
    FROM resultados_laboratorio r
    JOIN pacientes p ON p.id_paciente = r.id_paciente
    JOIN usuarios up ON up.id_usuario = p.id_usuario
    LEFT JOIN doctores dor ON dor.id_doctor = r.id_doctor_ordenante
    LEFT JOIN usuarios uo ON uo.id_usuario = dor.id_usuario
    LEFT JOIN doctores din ON din.id_doctor = r.id_doctor_interpreta
    LEFT JOIN usuarios ui ON ui.id_usuario = din.id_usuario
"#;

const ORDER_RECENT: &str = "ORDER BY r.fecha_examen DESC, r.fecha_registro DESC";

pub async fn list_all(db: &PgPool) -> Result<Vec<LabResultRow>, sqlx::Error> {
    let sql = format!("{SELECT_RESULT} {ORDER_RECENT}");
    sqlx::query_as::<_, LabResultRow>(&sql).fetch_all(db).await
}

/// Case-insensitive substring match on `tipo_examen`.
pub async fn by_type(db: &PgPool, tipo: &str) -> Result<Vec<LabResultRow>, sqlx::Error> {
    let sql = format!("{SELECT_RESULT} WHERE r.tipo_examen ILIKE $1 {ORDER_RECENT}");
    sqlx::query_as::<_, LabResultRow>(&sql)
        .bind(format!("%{tipo}%"))
        .fetch_all(db)
        .await
}

pub async fn by_patient(db: &PgPool, patient_id: i32) -> Result<Vec<LabResultRow>, sqlx::Error> {
    let sql = format!("{SELECT_RESULT} WHERE r.id_paciente = $1 {ORDER_RECENT}");
    sqlx::query_as::<_, LabResultRow>(&sql)
        .bind(patient_id)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<LabResultRow>, sqlx::Error> {
    let sql = format!("{SELECT_RESULT} WHERE r.id_resultado = $1");
    sqlx::query_as::<_, LabResultRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Required fields are checked by the handler.
pub async fn insert(db: &PgPool, r: &LabResultFields) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO resultados_laboratorio (
            id_paciente, fecha_examen, tipo_examen, resultados, valores_referencia,
            interpretacion, id_doctor_ordenante, id_doctor_interpreta
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING id_resultado
        "#,
    )
    .bind(r.id_paciente)
    .bind(r.fecha_examen)
    .bind(&r.tipo_examen)
    .bind(&r.resultados)
    .bind(&r.valores_referencia)
    .bind(&r.interpretacion)
    .bind(r.id_doctor_ordenante)
    .bind(r.id_doctor_interpreta)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, r: &LabResultFields) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE resultados_laboratorio
        SET fecha_examen         = COALESCE($2, fecha_examen),
            tipo_examen          = COALESCE($3, tipo_examen),
            resultados           = COALESCE($4, resultados),
            valores_referencia   = COALESCE($5, valores_referencia),
            interpretacion       = COALESCE($6, interpretacion),
            id_doctor_ordenante  = COALESCE($7, id_doctor_ordenante),
            id_doctor_interpreta = COALESCE($8, id_doctor_interpreta)
        WHERE id_resultado = $1
        "#,
    )
    .bind(id)
    .bind(r.fecha_examen)
    .bind(&r.tipo_examen)
    .bind(&r.resultados)
    .bind(&r.valores_referencia)
    .bind(&r.interpretacion)
    .bind(r.id_doctor_ordenante)
    .bind(r.id_doctor_interpreta)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM resultados_laboratorio WHERE id_resultado = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
