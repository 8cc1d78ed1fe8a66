// src/repo/reports.rs
//
// Read-only aggregates for /reportes. Counts come back as BIGINT.

use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiabetesTypeCount {
    pub tipo_diabetes: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RiskLevelCount {
    pub nivel_riesgo: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub mes: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RiskGradeCount {
    pub grado_riesgo: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DoctorActivity {
    pub id_doctor: i32,
    pub nombre_doctor: String,
    pub email: String,
    pub especialidad: Option<String>,
    pub cantidad_pacientes: i64,
    pub cantidad_consultas: i64,
    pub cantidad_evaluaciones: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DoctorTotals {
    pub cantidad_pacientes: i64,
    pub cantidad_consultas: i64,
    pub cantidad_evaluaciones: i64,
    pub cantidad_tratamientos: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientTotals {
    pub cantidad_consultas: i64,
    pub cantidad_evaluaciones: i64,
    pub cantidad_tratamientos: i64,
    pub cantidad_resultados: i64,
}

const RISK_ORDER: &str = r#"
    CASE nivel_riesgo
        WHEN 'Bajo' THEN 1
        WHEN 'Medio' THEN 2
        WHEN 'Alto' THEN 3
        WHEN 'Muy Alto' THEN 4
        ELSE 5
    END
"#;

pub async fn patients_by_diabetes_type(db: &PgPool) -> Result<Vec<DiabetesTypeCount>, sqlx::Error> {
    sqlx::query_as::<_, DiabetesTypeCount>(
        r#"
        SELECT tipo_diabetes, COUNT(*) AS cantidad
        FROM pacientes
        WHERE tipo_diabetes IS NOT NULL
        GROUP BY tipo_diabetes
        ORDER BY cantidad DESC
        "#,
    )
    .fetch_all(db)
    .await
}

/// All patients, or only those whose primary doctor is `doctor_id`.
pub async fn patients_by_risk_level(
    db: &PgPool,
    doctor_id: Option<i32>,
) -> Result<Vec<RiskLevelCount>, sqlx::Error> {
    let sql = format!(
        "SELECT nivel_riesgo, COUNT(*) AS cantidad
         FROM pacientes
         WHERE nivel_riesgo IS NOT NULL
           AND ($1::int IS NULL OR id_doctor_principal = $1)
         GROUP BY nivel_riesgo
         ORDER BY {RISK_ORDER}"
    );
    sqlx::query_as::<_, RiskLevelCount>(&sql)
        .bind(doctor_id)
        .fetch_all(db)
        .await
}

/// Consultations per calendar month over the last `months` months.
pub async fn consultations_per_month(
    db: &PgPool,
    months: i32,
    doctor_id: Option<i32>,
) -> Result<Vec<MonthCount>, sqlx::Error> {
    sqlx::query_as::<_, MonthCount>(
        r#"
        SELECT TO_CHAR(DATE_TRUNC('month', fecha_consulta), 'YYYY-MM') AS mes,
               COUNT(*) AS cantidad
        FROM consultas
        WHERE fecha_consulta >= now() - make_interval(months => $1)
          AND ($2::int IS NULL OR id_doctor = $2)
        GROUP BY mes
        ORDER BY mes
        "#,
    )
    .bind(months)
    .bind(doctor_id)
    .fetch_all(db)
    .await
}

pub async fn evaluations_by_risk_grade(db: &PgPool) -> Result<Vec<RiskGradeCount>, sqlx::Error> {
    sqlx::query_as::<_, RiskGradeCount>(
        r#"
        SELECT grado_riesgo, COUNT(*) AS cantidad
        FROM evaluaciones_pie
        GROUP BY grado_riesgo
        ORDER BY grado_riesgo
        "#,
    )
    .fetch_all(db)
    .await
}

/// One row per approved doctor.
pub async fn doctor_activity(db: &PgPool) -> Result<Vec<DoctorActivity>, sqlx::Error> {
    sqlx::query_as::<_, DoctorActivity>(
        r#"
        SELECT d.id_doctor,
               CONCAT(u.nombre, ' ', u.apellido) AS nombre_doctor,
               u.email,
               d.especialidad,
               COUNT(DISTINCT p.id_paciente) AS cantidad_pacientes,
               COUNT(DISTINCT c.id_consulta) AS cantidad_consultas,
               COUNT(DISTINCT ep.id_evaluacion) AS cantidad_evaluaciones
        FROM doctores d
        JOIN usuarios u ON u.id_usuario = d.id_usuario
        LEFT JOIN pacientes p ON p.id_doctor_principal = d.id_doctor
        LEFT JOIN consultas c ON c.id_doctor = d.id_doctor
        LEFT JOIN evaluaciones_pie ep ON ep.id_consulta = c.id_consulta
        WHERE d.estado_verificacion = 'Aprobado'
        GROUP BY d.id_doctor, u.nombre, u.apellido, u.email, d.especialidad
        ORDER BY cantidad_pacientes DESC, cantidad_consultas DESC
        "#,
    )
    .fetch_all(db)
    .await
}

/// `None` when the doctor does not exist.
pub async fn doctor_totals(db: &PgPool, doctor_id: i32) -> Result<Option<DoctorTotals>, sqlx::Error> {
    sqlx::query_as::<_, DoctorTotals>(
        r#"
        SELECT COUNT(DISTINCT p.id_paciente) AS cantidad_pacientes,
               COUNT(DISTINCT c.id_consulta) AS cantidad_consultas,
               COUNT(DISTINCT ep.id_evaluacion) AS cantidad_evaluaciones,
               COUNT(DISTINCT t.id_tratamiento) AS cantidad_tratamientos
        FROM doctores d
        LEFT JOIN pacientes p ON p.id_doctor_principal = d.id_doctor
        LEFT JOIN consultas c ON c.id_doctor = d.id_doctor
        LEFT JOIN evaluaciones_pie ep ON ep.id_consulta = c.id_consulta
        LEFT JOIN tratamientos t ON t.id_consulta = c.id_consulta
        WHERE d.id_doctor = $1
        GROUP BY d.id_doctor
        "#,
    )
    .bind(doctor_id)
    .fetch_optional(db)
    .await
}

pub async fn patient_totals(db: &PgPool, patient_id: i32) -> Result<PatientTotals, sqlx::Error> {
    sqlx::query_as::<_, PatientTotals>(
        r#"
        SELECT COUNT(DISTINCT c.id_consulta) AS cantidad_consultas,
               COUNT(DISTINCT ep.id_evaluacion) AS cantidad_evaluaciones,
               COUNT(DISTINCT t.id_tratamiento) AS cantidad_tratamientos,
               COUNT(DISTINCT rl.id_resultado) AS cantidad_resultados
        FROM pacientes p
        LEFT JOIN consultas c ON c.id_paciente = p.id_paciente
        LEFT JOIN evaluaciones_pie ep ON ep.id_consulta = c.id_consulta
        LEFT JOIN tratamientos t ON t.id_consulta = c.id_consulta
        LEFT JOIN resultados_laboratorio rl ON rl.id_paciente = p.id_paciente
        WHERE p.id_paciente = $1
        "#,
    )
    .bind(patient_id)
    .fetch_one(db)
    .await
}
