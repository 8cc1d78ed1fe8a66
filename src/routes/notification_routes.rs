// src/routes/notification_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::{access::require_admin, auth_context::AuthContext},
    models::{ApiOk, AppState, non_blank},
    policy::Denial,
    repo::{
        self,
        notifications::{NewNotification, NotificationRow},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/contador", get(unread_counter))
        .route("/leer-todas", put(mark_all_read))
        .route("/{id}/leer", put(mark_read))
        .route("/{id}", delete(delete_notification))
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub noleidas: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCounter {
    pub contador: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationRequest {
    pub id_usuario_destino: Option<i32>,
    pub tipo_notificacion: Option<String>,
    pub titulo: Option<String>,
    pub mensaje: Option<String>,
    pub entidad_relacionada: Option<String>,
    pub id_entidad: Option<i32>,
}

impl NotificationRequest {
    fn into_new(self) -> Result<NewNotification, ApiError> {
        let (Some(id_usuario_destino), Some(tipo), Some(titulo), Some(mensaje)) = (
            self.id_usuario_destino,
            non_blank(self.tipo_notificacion.as_deref()),
            non_blank(self.titulo.as_deref()),
            non_blank(self.mensaje.as_deref()),
        ) else {
            return Err(ApiError::validation(
                "id_usuario_destino, tipo_notificacion, titulo and mensaje are required",
            ));
        };
        Ok(NewNotification {
            id_usuario_destino,
            tipo_notificacion: tipo.to_string(),
            titulo: titulo.to_string(),
            mensaje: mensaje.to_string(),
            entidad_relacionada: self.entidad_relacionada,
            id_entidad: self.id_entidad,
        })
    }
}

/// 404 when missing, 403 when it belongs to someone else.
async fn load_own(state: &AppState, auth: &AuthContext, id: i32) -> Result<NotificationRow, ApiError> {
    let notification = repo::notifications::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    if notification.id_usuario_destino != auth.user_id {
        return Err(Denial::NotPermitted.into());
    }
    Ok(notification)
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<NotificationsQuery>,
) -> Result<Json<ApiOk<Vec<NotificationRow>>>, ApiError> {
    let unread_only = q.noleidas.unwrap_or(false);
    let rows = repo::notifications::list_for_user(&state.db, auth.user_id, unread_only).await?;
    Ok(Json(ApiOk::data(rows)))
}

pub async fn unread_counter(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UnreadCounter>, ApiError> {
    let contador = repo::notifications::unread_count(&state.db, auth.user_id).await?;
    Ok(Json(UnreadCounter { contador }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<NotificationRow>>, ApiError> {
    load_own(&state, &auth, id).await?;
    let notification = repo::notifications::mark_read(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    Ok(Json(ApiOk::with_message("Notification marked as read", notification)))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<()>>, ApiError> {
    let changed = repo::notifications::mark_all_read(&state.db, auth.user_id).await?;
    Ok(Json(ApiOk::message(format!("{changed} notifications marked as read"))))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> Result<Json<ApiOk<()>>, ApiError> {
    load_own(&state, &auth, id).await?;
    repo::notifications::delete(&state.db, id).await?;
    Ok(Json(ApiOk::message("Notification deleted")))
}

pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NotificationRequest>,
) -> Result<(StatusCode, Json<ApiOk<NotificationRow>>), ApiError> {
    require_admin(&auth)?;
    let new = req.into_new()?;

    let notification = repo::notifications::insert(&state.db, &new)
        .await
        .map_err(ApiError::from_write)?;
    tracing::info!(
        notification_id = notification.id_notificacion,
        recipient = notification.id_usuario_destino,
        "notification sent"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::with_message("Notification created", notification)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_rejected() {
        let req = NotificationRequest {
            id_usuario_destino: Some(4),
            tipo_notificacion: Some("Sistema".into()),
            titulo: Some("   ".into()),
            mensaje: Some("Mantenimiento programado".into()),
            ..NotificationRequest::default()
        };
        assert!(req.into_new().is_err());
    }

    #[test]
    fn trims_required_text() {
        let req = NotificationRequest {
            id_usuario_destino: Some(4),
            tipo_notificacion: Some(" Sistema ".into()),
            titulo: Some("Aviso".into()),
            mensaje: Some("Mantenimiento programado".into()),
            ..NotificationRequest::default()
        };
        let new = req.into_new().unwrap();
        assert_eq!(new.tipo_notificacion, "Sistema");
        assert!(new.entidad_relacionada.is_none());
    }
}
