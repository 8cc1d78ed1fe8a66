// src/routes/foot_evaluation_routes.rs

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::{
        access::{list_scope, require_patient_access, require_record_access, require_verified_doctor},
        auth_context::AuthContext,
    },
    models::{ApiOk, AppState, non_blank},
    policy::ListScope,
    repo::{
        self,
        foot_evaluations::{EvaluationFields, EvaluationOwners, EvaluationRow, ImageRow, NewImage},
    },
    uploads::{self, MAX_IMAGE_BYTES},
};

/// Room for the text fields and multipart framing around the image itself.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_evaluations).post(create_evaluation))
        .route("/paciente/{id_paciente}", get(patient_evaluations))
        .route(
            "/{id}",
            get(get_evaluation)
                .put(update_evaluation)
                .delete(delete_evaluation),
        )
        .route("/{id}/imagenes", get(list_images).post(add_image))
        .route(
            "/{id}/imagenes/upload",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/imagenes/{id_imagen}", delete(delete_image))
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub url_imagen: Option<String>,
    pub tipo_imagen: Option<String>,
    pub descripcion: Option<String>,
    pub fecha_captura: Option<DateTime<Utc>>,
}

/// Fields collected from an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    data: Option<Vec<u8>>,
    file_name: Option<String>,
    tipo_imagen: Option<String>,
    descripcion: Option<String>,
    fecha_captura: Option<String>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    multipart_rejection(e.status(), &e.body_text())
}

fn multipart_rejection(status: StatusCode, detail: &str) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("image exceeds the 5 MB limit")
    } else {
        ApiError::validation(format!("invalid multipart body: {detail}"))
    }
}

fn parse_capture_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    non_blank(raw)
        .map(|s| {
            s.parse::<DateTime<Utc>>()
                .map_err(|_| ApiError::validation("fecha_captura must be an RFC 3339 timestamp"))
        })
        .transpose()
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("imagen") => {
                if !uploads::is_image_content_type(field.content_type()) {
                    return Err(ApiError::validation("imagen must be an image file"));
                }
                form.file_name = field.file_name().map(str::to_owned);
                form.data = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            Some("tipo_imagen") => form.tipo_imagen = Some(field.text().await.map_err(multipart_error)?),
            Some("descripcion") => form.descripcion = Some(field.text().await.map_err(multipart_error)?),
            Some("fecha_captura") => form.fecha_captura = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = ?other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

async fn load_evaluation(state: &AppState, id: i32) -> Result<EvaluationRow, ApiError> {
    repo::foot_evaluations::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Foot evaluation"))
}

async fn load_owners(state: &AppState, id: i32) -> Result<EvaluationOwners, ApiError> {
    repo::foot_evaluations::owners(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Foot evaluation"))
}

/* -------------------------
   Evaluations
--------------------------*/

pub async fn list_evaluations(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<EvaluationRow>>>, ApiError> {
    let scope = list_scope(&state, &auth).await?;
    let rows = repo::foot_evaluations::list(&state.db, scope).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn patient_evaluations(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i32>,
) -> Result<Json<ApiOk<Vec<EvaluationRow>>>, ApiError> {
    require_patient_access(&state, &auth, patient_id).await?;
    let rows = repo::foot_evaluations::list(&state.db, ListScope::Patient(patient_id)).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn get_evaluation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<EvaluationRow>>, ApiError> {
    let evaluation = load_evaluation(&state, id).await?;
    require_record_access(&state, &auth, evaluation.id_paciente, evaluation.id_doctor).await?;
    Ok(Json(ApiOk::data(evaluation)))
}

pub async fn create_evaluation(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<EvaluationFields>,
) -> Result<(StatusCode, Json<ApiOk<EvaluationRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if req.id_consulta.is_none() {
        return Err(ApiError::validation("id_consulta is required"));
    }

    let id = repo::foot_evaluations::insert(&state.db, &req)
        .await
        .map_err(ApiError::from_write)?;
    let evaluation = load_evaluation(&state, id).await?;

    tracing::info!(evaluation_id = id, consultation_id = evaluation.id_consulta, "foot evaluation recorded");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Foot evaluation created", evaluation)),
    ))
}

pub async fn update_evaluation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<EvaluationFields>,
) -> Result<Json<ApiOk<EvaluationRow>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::foot_evaluations::update(&state.db, id, &req)
        .await
        .map_err(ApiError::from_write)?
    {
        return Err(ApiError::not_found("Foot evaluation"));
    }
    let evaluation = load_evaluation(&state, id).await?;
    Ok(Json(ApiOk::with_message("Foot evaluation updated", evaluation)))
}

/// Hard delete. Image rows go with it; stored files are left in place.
pub async fn delete_evaluation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    if !repo::foot_evaluations::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Foot evaluation"));
    }
    tracing::info!(evaluation_id = id, by = auth.user_id, "foot evaluation deleted");
    Ok(Json(ApiOk::message("Foot evaluation deleted")))
}

/* -------------------------
   Images
--------------------------*/

pub async fn list_images(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<Vec<ImageRow>>>, ApiError> {
    let owners = load_owners(&state, id).await?;
    require_record_access(&state, &auth, owners.id_paciente, owners.id_doctor).await?;
    let images = repo::foot_evaluations::images(&state.db, id).await?;
    Ok(Json(ApiOk::data(images)))
}

/// Registers an image already hosted elsewhere.
pub async fn add_image(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    Json(req): Json<ImageRequest>,
) -> Result<(StatusCode, Json<ApiOk<ImageRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let Some(url_imagen) = non_blank(req.url_imagen.as_deref()).map(str::to_owned) else {
        return Err(ApiError::validation("url_imagen is required"));
    };
    let tipo_imagen = uploads::image_kind(req.tipo_imagen.as_deref())?;
    load_owners(&state, id).await?;

    let image = repo::foot_evaluations::insert_image(
        &state.db,
        id,
        &NewImage {
            url_imagen,
            tipo_imagen,
            descripcion: req.descripcion,
            fecha_captura: req.fecha_captura,
        },
    )
    .await
    .map_err(ApiError::from_write)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Image added", image)),
    ))
}

/// Stores the `imagen` part under the upload directory and records its URL.
/// The file is removed again if the row cannot be written.
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiOk<ImageRow>>), ApiError> {
    require_verified_doctor(&state, &auth).await?;
    load_owners(&state, id).await?;

    let form = read_upload_form(multipart).await?;
    let Some(data) = form.data else {
        return Err(ApiError::validation("imagen file is required"));
    };
    let tipo_imagen = uploads::image_kind(form.tipo_imagen.as_deref())?;
    let fecha_captura = parse_capture_date(form.fecha_captura.as_deref())?;

    let stored = uploads::store_evaluation_image(&state.upload_dir, &data, form.file_name.as_deref()).await?;

    let inserted = repo::foot_evaluations::insert_image(
        &state.db,
        id,
        &NewImage {
            url_imagen: stored.url.clone(),
            tipo_imagen,
            descripcion: form.descripcion.filter(|d| !d.trim().is_empty()),
            fecha_captura,
        },
    )
    .await;

    let image = match inserted {
        Ok(image) => image,
        Err(e) => {
            uploads::remove_stored_image(&state.upload_dir, &stored.url).await;
            return Err(ApiError::from_write(e));
        }
    };

    tracing::info!(
        evaluation_id = id,
        image_id = image.id_imagen,
        size_bytes = data.len(),
        "evaluation image uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Image uploaded", image)),
    ))
}

pub async fn delete_image(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(image_id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    require_verified_doctor(&state, &auth).await?;
    let image = repo::foot_evaluations::delete_image(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Image"))?;

    uploads::remove_stored_image(&state.upload_dir, &image.url_imagen).await;
    tracing::info!(image_id, evaluation_id = image.id_evaluacion, "evaluation image deleted");
    Ok(Json(ApiOk::message("Image deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_date_is_optional_rfc3339() {
        assert_eq!(parse_capture_date(None).unwrap(), None);
        assert_eq!(parse_capture_date(Some("  ")).unwrap(), None);
        let parsed = parse_capture_date(Some("2026-05-04T10:15:00Z")).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-05-04T10:15:00+00:00");
        assert!(parse_capture_date(Some("04/05/2026")).is_err());
    }

    #[test]
    fn oversized_upload_is_413() {
        let err = multipart_rejection(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded");
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(matches!(err, ApiError::PayloadTooLarge("PAYLOAD_TOO_LARGE", _)));

        let err = multipart_rejection(StatusCode::BAD_REQUEST, "missing boundary");
        assert!(matches!(err, ApiError::BadRequest("VALIDATION_ERROR", ref m) if m.ends_with("missing boundary")));
    }
}
