use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::error::ApiError;
use crate::models::{AppState, Role};
use crate::policy::AccessContext;

/// Identity decoded from the bearer token. No database round trip.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    pub doctor_id: Option<i32>,
    pub patient_id: Option<i32>,
}

impl AuthContext {
    pub fn access(&self) -> AccessContext {
        AccessContext {
            role: self.role,
            user_id: self.user_id,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|rejection| {
                        if rejection.is_missing() {
                            ApiError::authentication_required()
                        } else {
                            ApiError::invalid_token()
                        }
                    })?;

            let claims = state.jwt.verify(authz.token()).map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ApiError::invalid_token()
            })?;

            let role = Role::try_from(claims.rol).map_err(|_| ApiError::invalid_token())?;

            Ok(AuthContext {
                user_id: claims.id,
                email: claims.email,
                role,
                doctor_id: claims.id_doctor,
                patient_id: claims.id_paciente,
            })
        }
    }
}
