// src/repo/foot_evaluations.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::scope_filters;
use crate::policy::ListScope;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EvaluationRow {
    pub id_evaluacion: i32,
    pub id_consulta: i32,
    pub pie: Option<String>,
    pub pulso_pedio: Option<String>,
    pub pulso_tibial: Option<String>,
    pub tiempo_llenado_capilar: Option<String>,
    pub temperatura_piel: Option<String>,
    pub color_piel: Option<String>,
    pub sensibilidad_tactil: Option<String>,
    pub sensibilidad_vibratoria: Option<String>,
    pub sensibilidad_dolorosa: Option<String>,
    pub reflejos: Option<String>,
    pub deformidades: bool,
    pub descripcion_deformidades: Option<String>,
    pub callosidades: bool,
    pub ubicacion_callosidades: Option<String>,
    pub presencia_ulceras: bool,
    pub clasificacion_wagner: Option<String>,
    pub clasificacion_texas: Option<String>,
    pub localizacion_lesiones: Option<String>,
    pub evaluacion_calzado: Option<String>,
    pub recomendacion_calzado: Option<String>,
    pub grado_riesgo: String,
    pub observaciones: Option<String>,
    pub fecha_evaluacion: DateTime<Utc>,
    pub fecha_consulta: DateTime<Utc>,
    pub id_paciente: i32,
    pub id_doctor: i32,
    pub nombre_paciente: String,
    pub nombre_doctor: String,
}

/// Request body for create and update; on update absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationFields {
    pub id_consulta: Option<i32>,
    pub pie: Option<String>,
    pub pulso_pedio: Option<String>,
    pub pulso_tibial: Option<String>,
    pub tiempo_llenado_capilar: Option<String>,
    pub temperatura_piel: Option<String>,
    pub color_piel: Option<String>,
    pub sensibilidad_tactil: Option<String>,
    pub sensibilidad_vibratoria: Option<String>,
    pub sensibilidad_dolorosa: Option<String>,
    pub reflejos: Option<String>,
    pub deformidades: Option<bool>,
    pub descripcion_deformidades: Option<String>,
    pub callosidades: Option<bool>,
    pub ubicacion_callosidades: Option<String>,
    pub presencia_ulceras: Option<bool>,
    pub clasificacion_wagner: Option<String>,
    pub clasificacion_texas: Option<String>,
    pub localizacion_lesiones: Option<String>,
    pub evaluacion_calzado: Option<String>,
    pub recomendacion_calzado: Option<String>,
    pub grado_riesgo: Option<String>,
    pub observaciones: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageRow {
    pub id_imagen: i32,
    pub id_evaluacion: i32,
    pub url_imagen: String,
    pub tipo_imagen: String,
    pub descripcion: Option<String>,
    pub fecha_captura: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub url_imagen: String,
    pub tipo_imagen: &'static str,
    pub descripcion: Option<String>,
    pub fecha_captura: Option<DateTime<Utc>>,
}

/// Patient and doctor behind an evaluation or one of its images.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct EvaluationOwners {
    pub id_evaluacion: i32,
    pub id_paciente: i32,
    pub id_doctor: i32,
}

const SELECT_EVALUATION: &str = r#"
    SELECT e.*, c.fecha_consulta, c.id_paciente, c.id_doctor,
           CONCAT(up.nombre, ' ', up.apellido) AS nombre_paciente,
           CONCAT(ud.nombre, ' ', ud.apellido) AS nombre_doctor
    FROM evaluaciones_pie e
    JOIN consultas c ON c.id_consulta = e.id_consulta
    JOIN pacientes p ON p.id_paciente = c.id_paciente
    JOIN usuarios up ON up.id_usuario = p.id_usuario
    JOIN doctores d ON d.id_doctor = c.id_doctor
    JOIN usuarios ud ON ud.id_usuario = d.id_usuario
"#;

pub async fn list(db: &PgPool, scope: ListScope) -> Result<Vec<EvaluationRow>, sqlx::Error> {
    let Some((doctor, patient)) = scope_filters(scope) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "{SELECT_EVALUATION}
         WHERE ($1::int IS NULL OR c.id_doctor = $1)
           AND ($2::int IS NULL OR c.id_paciente = $2)
         ORDER BY e.fecha_evaluacion DESC"
    );
    sqlx::query_as::<_, EvaluationRow>(&sql)
        .bind(doctor)
        .bind(patient)
        .fetch_all(db)
        .await
}

pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<EvaluationRow>, sqlx::Error> {
    let sql = format!("{SELECT_EVALUATION} WHERE e.id_evaluacion = $1");
    sqlx::query_as::<_, EvaluationRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn owners(db: &PgPool, id: i32) -> Result<Option<EvaluationOwners>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationOwners>(
        r#"
        SELECT e.id_evaluacion, c.id_paciente, c.id_doctor
        FROM evaluaciones_pie e
        JOIN consultas c ON c.id_consulta = e.id_consulta
        WHERE e.id_evaluacion = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// `id_consulta` must be present; the handler checks.
pub async fn insert(db: &PgPool, e: &EvaluationFields) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO evaluaciones_pie (
            id_consulta, pie, pulso_pedio, pulso_tibial, tiempo_llenado_capilar,
            temperatura_piel, color_piel, sensibilidad_tactil, sensibilidad_vibratoria,
            sensibilidad_dolorosa, reflejos, deformidades, descripcion_deformidades,
            callosidades, ubicacion_callosidades, presencia_ulceras,
            clasificacion_wagner, clasificacion_texas, localizacion_lesiones,
            evaluacion_calzado, recomendacion_calzado, grado_riesgo, observaciones
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,
                COALESCE($12, false),$13,COALESCE($14, false),$15,COALESCE($16, false),
                $17,$18,$19,$20,$21,COALESCE($22, '0'),$23)
        RETURNING id_evaluacion
        "#,
    )
    .bind(e.id_consulta)
    .bind(&e.pie)
    .bind(&e.pulso_pedio)
    .bind(&e.pulso_tibial)
    .bind(&e.tiempo_llenado_capilar)
    .bind(&e.temperatura_piel)
    .bind(&e.color_piel)
    .bind(&e.sensibilidad_tactil)
    .bind(&e.sensibilidad_vibratoria)
    .bind(&e.sensibilidad_dolorosa)
    .bind(&e.reflejos)
    .bind(e.deformidades)
    .bind(&e.descripcion_deformidades)
    .bind(e.callosidades)
    .bind(&e.ubicacion_callosidades)
    .bind(e.presencia_ulceras)
    .bind(&e.clasificacion_wagner)
    .bind(&e.clasificacion_texas)
    .bind(&e.localizacion_lesiones)
    .bind(&e.evaluacion_calzado)
    .bind(&e.recomendacion_calzado)
    .bind(&e.grado_riesgo)
    .bind(&e.observaciones)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: i32, e: &EvaluationFields) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE evaluaciones_pie
        SET pie                      = COALESCE($2, pie),
            pulso_pedio              = COALESCE($3, pulso_pedio),
            pulso_tibial             = COALESCE($4, pulso_tibial),
            tiempo_llenado_capilar   = COALESCE($5, tiempo_llenado_capilar),
            temperatura_piel         = COALESCE($6, temperatura_piel),
            color_piel               = COALESCE($7, color_piel),
            sensibilidad_tactil      = COALESCE($8, sensibilidad_tactil),
            sensibilidad_vibratoria  = COALESCE($9, sensibilidad_vibratoria),
            sensibilidad_dolorosa    = COALESCE($10, sensibilidad_dolorosa),
            reflejos                 = COALESCE($11, reflejos),
            deformidades             = COALESCE($12, deformidades),
            descripcion_deformidades = COALESCE($13, descripcion_deformidades),
            callosidades             = COALESCE($14, callosidades),
            ubicacion_callosidades   = COALESCE($15, ubicacion_callosidades),
            presencia_ulceras        = COALESCE($16, presencia_ulceras),
            clasificacion_wagner     = COALESCE($17, clasificacion_wagner),
            clasificacion_texas      = COALESCE($18, clasificacion_texas),
            localizacion_lesiones    = COALESCE($19, localizacion_lesiones),
            evaluacion_calzado       = COALESCE($20, evaluacion_calzado),
            recomendacion_calzado    = COALESCE($21, recomendacion_calzado),
            grado_riesgo             = COALESCE($22, grado_riesgo),
            observaciones            = COALESCE($23, observaciones)
        WHERE id_evaluacion = $1
        "#,
    )
    .bind(id)
    .bind(&e.pie)
    .bind(&e.pulso_pedio)
    .bind(&e.pulso_tibial)
    .bind(&e.tiempo_llenado_capilar)
    .bind(&e.temperatura_piel)
    .bind(&e.color_piel)
    .bind(&e.sensibilidad_tactil)
    .bind(&e.sensibilidad_vibratoria)
    .bind(&e.sensibilidad_dolorosa)
    .bind(&e.reflejos)
    .bind(e.deformidades)
    .bind(&e.descripcion_deformidades)
    .bind(e.callosidades)
    .bind(&e.ubicacion_callosidades)
    .bind(e.presencia_ulceras)
    .bind(&e.clasificacion_wagner)
    .bind(&e.clasificacion_texas)
    .bind(&e.localizacion_lesiones)
    .bind(&e.evaluacion_calzado)
    .bind(&e.recomendacion_calzado)
    .bind(&e.grado_riesgo)
    .bind(&e.observaciones)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Hard delete; image rows cascade.
pub async fn delete(db: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(r#"DELETE FROM evaluaciones_pie WHERE id_evaluacion = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/* -------------------------
   Images
--------------------------*/

pub async fn images(db: &PgPool, evaluation_id: i32) -> Result<Vec<ImageRow>, sqlx::Error> {
    sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT * FROM imagenes_evaluacion
        WHERE id_evaluacion = $1
        ORDER BY fecha_captura DESC
        "#,
    )
    .bind(evaluation_id)
    .fetch_all(db)
    .await
}

pub async fn insert_image(db: &PgPool, evaluation_id: i32, img: &NewImage) -> Result<ImageRow, sqlx::Error> {
    sqlx::query_as::<_, ImageRow>(
        r#"
        INSERT INTO imagenes_evaluacion (id_evaluacion, url_imagen, tipo_imagen, descripcion, fecha_captura)
        VALUES ($1, $2, $3, $4, COALESCE($5, now()))
        RETURNING *
        "#,
    )
    .bind(evaluation_id)
    .bind(&img.url_imagen)
    .bind(img.tipo_imagen)
    .bind(&img.descripcion)
    .bind(img.fecha_captura)
    .fetch_one(db)
    .await
}

/// Returns the deleted row so the caller can remove the stored file.
pub async fn delete_image(db: &PgPool, image_id: i32) -> Result<Option<ImageRow>, sqlx::Error> {
    sqlx::query_as::<_, ImageRow>(r#"DELETE FROM imagenes_evaluacion WHERE id_imagen = $1 RETURNING *"#)
        .bind(image_id)
        .fetch_optional(db)
        .await
}
