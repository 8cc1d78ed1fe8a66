// src/middleware/access.rs
//
// Database-backed guards. Each one gathers the facts a `policy` rule needs
// and turns a denial into a 403.

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Role},
    policy::{self, Denial, PatientRelation},
    repo,
};

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        ApiError::Forbidden("FORBIDDEN", denial.message().to_string())
    }
}

pub fn require_admin(auth: &AuthContext) -> Result<(), ApiError> {
    policy::require_admin(&auth.access())?;
    Ok(())
}

pub fn require_self_or_admin(auth: &AuthContext, target_user_id: i32) -> Result<(), ApiError> {
    policy::self_or_admin(&auth.access(), target_user_id)?;
    Ok(())
}

/// Admin, or a doctor whose profile is approved right now. Returns the
/// caller's doctor id (`None` for admins).
pub async fn require_verified_doctor(state: &AppState, auth: &AuthContext) -> Result<Option<i32>, ApiError> {
    let ctx = auth.access();
    if auth.role != Role::Doctor {
        policy::verified_doctor_or_admin(&ctx, None)?;
        return Ok(None);
    }

    let identity = repo::doctors::identity_for_user(&state.db, auth.user_id).await?;
    policy::verified_doctor_or_admin(&ctx, identity.as_ref().map(|i| i.status()))?;
    Ok(identity.map(|i| i.id_doctor))
}

/// Caller's own patient profile id: token claim first, then the database.
pub async fn caller_patient_id(state: &AppState, auth: &AuthContext) -> Result<Option<i32>, ApiError> {
    if auth.patient_id.is_some() || auth.role != Role::Patient {
        return Ok(auth.patient_id);
    }
    Ok(repo::patients::id_for_user(&state.db, auth.user_id).await?)
}

/// Caller's doctor profile id: token claim first, then the database.
async fn caller_doctor_id(state: &AppState, auth: &AuthContext) -> Result<Option<i32>, ApiError> {
    if auth.doctor_id.is_some() || auth.role != Role::Doctor {
        return Ok(auth.doctor_id);
    }
    let identity = repo::doctors::identity_for_user(&state.db, auth.user_id).await?;
    Ok(identity.map(|i| i.id_doctor))
}

/// Doctor-scoped listings: admin, or the doctor owning `target_doctor_id`.
pub async fn require_own_doctor_or_admin(
    state: &AppState,
    auth: &AuthContext,
    target_doctor_id: i32,
) -> Result<(), ApiError> {
    let mut ctx = auth.access();
    ctx.doctor_id = caller_doctor_id(state, auth).await?;
    policy::own_doctor_or_admin(&ctx, target_doctor_id)?;
    Ok(())
}

/// Gate for anything addressed by a patient id.
pub async fn require_patient_access(
    state: &AppState,
    auth: &AuthContext,
    patient_id: i32,
) -> Result<(), ApiError> {
    let ctx = auth.access();
    let mut relation = PatientRelation::default();

    match auth.role {
        Role::Admin => {}
        Role::Doctor => {
            if let Some(doctor_id) = caller_doctor_id(state, auth).await? {
                let primary = repo::patients::primary_doctor_of(&state.db, patient_id).await?;
                relation.is_primary_doctor = primary == Some(doctor_id);
                if !relation.is_primary_doctor {
                    relation.is_assigned = repo::assignments::exists(&state.db, doctor_id, patient_id)
                        .await
                        .unwrap_or_else(|e| {
                            tracing::warn!(error = %e, doctor_id, patient_id, "assignment lookup failed");
                            false
                        });
                }
            }
        }
        Role::Patient => {
            relation.own_patient_id = caller_patient_id(state, auth).await?;
        }
    }

    policy::patient_access(&ctx, patient_id, &relation)?;
    Ok(())
}

/// Gate for a clinical record owned by `patient_id` and written by
/// `doctor_id`: the record's doctor passes directly, everyone else goes
/// through patient access.
pub async fn require_record_access(
    state: &AppState,
    auth: &AuthContext,
    patient_id: i32,
    doctor_id: i32,
) -> Result<(), ApiError> {
    if auth.role == Role::Doctor && caller_doctor_id(state, auth).await? == Some(doctor_id) {
        return Ok(());
    }
    require_patient_access(state, auth, patient_id).await
}

/// Caller's list scope, with missing profile ids resolved from the database.
pub async fn list_scope(state: &AppState, auth: &AuthContext) -> Result<policy::ListScope, ApiError> {
    let mut ctx = auth.access();
    match auth.role {
        Role::Doctor => ctx.doctor_id = caller_doctor_id(state, auth).await?,
        Role::Patient => ctx.patient_id = caller_patient_id(state, auth).await?,
        Role::Admin => {}
    }
    Ok(policy::list_scope(&ctx))
}
