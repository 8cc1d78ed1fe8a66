use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{auth::JwtKeys, meeting::MeetingLinks};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub jwt: Arc<JwtKeys>,
    pub admin_secret: Option<String>,
    pub upload_dir: PathBuf,
    pub meetings: MeetingLinks,
}

/* -------------------------
   Roles & statuses
--------------------------*/

/// Role ids as stored in usuarios.id_rol and carried in the token `rol` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    Admin = 1,
    Doctor = 2,
    Patient = 3,
}

impl Role {
    pub fn id(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Admin),
            2 => Ok(Role::Doctor),
            3 => Ok(Role::Patient),
            other => Err(format!("unknown role id {other}")),
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

pub const USER_ACTIVE: &str = "Activo";
pub const USER_INACTIVE: &str = "Inactivo";

pub const CENTER_ACTIVE: &str = "Activo";
pub const CENTER_INACTIVE: &str = "Inactivo";

pub const DEFAULT_RISK_LEVEL: &str = "Medio";
pub const RISK_LEVELS: [&str; 4] = ["Bajo", "Medio", "Alto", "Muy Alto"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "Pendiente",
            VerificationStatus::Approved => "Aprobado",
            VerificationStatus::Rejected => "Rechazado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pendiente" => Some(VerificationStatus::Pending),
            "Aprobado" => Some(VerificationStatus::Approved),
            "Rechazado" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pendiente",
            AppointmentStatus::Confirmed => "Confirmada",
            AppointmentStatus::Completed => "Completada",
            AppointmentStatus::Cancelled => "Cancelada",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// Statuses that occupy the doctor's calendar.
    pub fn blocks_schedule(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

pub const TREATMENT_ACTIVE: &str = "Activo";
pub const TREATMENT_CANCELLED: &str = "Cancelado";

/* -------------------------
   Response envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiOk<T> {
    pub fn data(data: T) -> Self {
        Self { message: None, data: Some(data) }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self { message: Some(message.into()), data: Some(data) }
    }
}

impl ApiOk<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), data: None }
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// Trims and drops empty strings; used for "required" text fields in requests.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_integer_ids() {
        assert_eq!(Role::try_from(1), Ok(Role::Admin));
        assert_eq!(Role::try_from(3), Ok(Role::Patient));
        assert!(Role::try_from(4).is_err());
        assert_eq!(i32::from(Role::Doctor), 2);
    }

    #[test]
    fn only_pending_and_confirmed_block_schedule() {
        assert!(AppointmentStatus::Pending.blocks_schedule());
        assert!(AppointmentStatus::Confirmed.blocks_schedule());
        assert!(!AppointmentStatus::Cancelled.blocks_schedule());
        assert!(!AppointmentStatus::Completed.blocks_schedule());
        assert_eq!(AppointmentStatus::parse("Cancelada"), Some(AppointmentStatus::Cancelled));
        assert_eq!(AppointmentStatus::parse("cancelada"), None);
    }

    #[test]
    fn envelope_skips_absent_parts() {
        let body = serde_json::to_value(ApiOk::message("done")).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "done" }));

        let body = serde_json::to_value(ApiOk::data(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({ "data": [1, 2] }));
    }
}
