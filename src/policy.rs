//! Access-control rules as pure functions over an explicit caller context.
//!
//! Anything that needs the database (verification status, primary doctor,
//! assignment rows) is resolved by `middleware::access` and passed in.

use crate::models::{Role, VerificationStatus};

/// Who is calling, as far as authorization cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessContext {
    pub role: Role,
    pub user_id: i32,
    pub doctor_id: Option<i32>,
    pub patient_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotPermitted,
    NoDoctorProfile,
    PendingApproval,
}

impl Denial {
    pub fn message(self) -> &'static str {
        match self {
            Denial::NotPermitted => "You do not have permission to perform this action",
            Denial::NoDoctorProfile => "No doctor profile is associated with this user",
            Denial::PendingApproval => "Your doctor profile is pending administrator approval",
        }
    }
}

pub type Decision = Result<(), Denial>;

pub fn is_admin(ctx: &AccessContext) -> bool {
    ctx.role == Role::Admin
}

pub fn require_admin(ctx: &AccessContext) -> Decision {
    if is_admin(ctx) { Ok(()) } else { Err(Denial::NotPermitted) }
}

/// `status` is the caller's doctor profile verification, `None` when no profile exists.
pub fn verified_doctor_or_admin(ctx: &AccessContext, status: Option<VerificationStatus>) -> Decision {
    match ctx.role {
        Role::Admin => Ok(()),
        Role::Doctor => match status {
            None => Err(Denial::NoDoctorProfile),
            Some(VerificationStatus::Approved) => Ok(()),
            Some(_) => Err(Denial::PendingApproval),
        },
        Role::Patient => Err(Denial::NotPermitted),
    }
}

/// Facts about the caller's relation to one target patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatientRelation {
    /// Caller's doctor id equals the patient's primary doctor.
    pub is_primary_doctor: bool,
    /// A doctor_paciente row links the caller's doctor profile to the patient.
    pub is_assigned: bool,
    /// The caller's own patient profile id, if any.
    pub own_patient_id: Option<i32>,
}

pub fn patient_access(ctx: &AccessContext, target_patient_id: i32, relation: &PatientRelation) -> Decision {
    match ctx.role {
        Role::Admin => Ok(()),
        Role::Doctor if relation.is_primary_doctor || relation.is_assigned => Ok(()),
        Role::Patient if relation.own_patient_id == Some(target_patient_id) => Ok(()),
        _ => Err(Denial::NotPermitted),
    }
}

/// Users may act on their own account; admins on any.
pub fn self_or_admin(ctx: &AccessContext, target_user_id: i32) -> Decision {
    if is_admin(ctx) || ctx.user_id == target_user_id {
        Ok(())
    } else {
        Err(Denial::NotPermitted)
    }
}

/// Doctor-scoped resources (profile, statistics): admin, or the doctor owning `target_doctor_id`.
pub fn own_doctor_or_admin(ctx: &AccessContext, target_doctor_id: i32) -> Decision {
    match ctx.role {
        Role::Admin => Ok(()),
        Role::Doctor if ctx.doctor_id == Some(target_doctor_id) => Ok(()),
        _ => Err(Denial::NotPermitted),
    }
}

/// How list endpoints narrow their rows for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Doctor(i32),
    Patient(i32),
    Nothing,
}

pub fn list_scope(ctx: &AccessContext) -> ListScope {
    match ctx.role {
        Role::Admin => ListScope::All,
        Role::Doctor => ctx.doctor_id.map(ListScope::Doctor).unwrap_or(ListScope::Nothing),
        Role::Patient => ctx.patient_id.map(ListScope::Patient).unwrap_or(ListScope::Nothing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AccessContext {
        AccessContext {
            role,
            user_id: 10,
            doctor_id: None,
            patient_id: None,
        }
    }

    fn doctor(doctor_id: i32) -> AccessContext {
        AccessContext { doctor_id: Some(doctor_id), ..ctx(Role::Doctor) }
    }

    fn patient(patient_id: i32) -> AccessContext {
        AccessContext { patient_id: Some(patient_id), ..ctx(Role::Patient) }
    }

    #[test]
    fn admin_only() {
        assert_eq!(require_admin(&ctx(Role::Admin)), Ok(()));
        assert_eq!(require_admin(&doctor(1)), Err(Denial::NotPermitted));
        assert_eq!(require_admin(&patient(1)), Err(Denial::NotPermitted));
    }

    #[test]
    fn verified_doctor_rules() {
        let admin = ctx(Role::Admin);
        assert_eq!(verified_doctor_or_admin(&admin, None), Ok(()));

        let doc = doctor(4);
        assert_eq!(
            verified_doctor_or_admin(&doc, Some(VerificationStatus::Approved)),
            Ok(())
        );
        assert_eq!(
            verified_doctor_or_admin(&doc, Some(VerificationStatus::Pending)),
            Err(Denial::PendingApproval)
        );
        assert_eq!(
            verified_doctor_or_admin(&doc, Some(VerificationStatus::Rejected)),
            Err(Denial::PendingApproval)
        );
        assert_eq!(verified_doctor_or_admin(&doc, None), Err(Denial::NoDoctorProfile));

        assert_eq!(
            verified_doctor_or_admin(&patient(2), Some(VerificationStatus::Approved)),
            Err(Denial::NotPermitted)
        );
    }

    #[test]
    fn admin_always_reaches_any_patient() {
        let admin = ctx(Role::Admin);
        for target in [1, 2, 99] {
            assert_eq!(patient_access(&admin, target, &PatientRelation::default()), Ok(()));
        }
    }

    #[test]
    fn patient_reaches_only_own_record() {
        let me = patient(2);
        let rel = PatientRelation { own_patient_id: Some(2), ..Default::default() };
        assert_eq!(patient_access(&me, 2, &rel), Ok(()));
        assert_eq!(patient_access(&me, 3, &rel), Err(Denial::NotPermitted));
        assert_eq!(
            patient_access(&me, 2, &PatientRelation::default()),
            Err(Denial::NotPermitted)
        );
    }

    #[test]
    fn doctor_needs_primary_or_assignment() {
        let doc = doctor(5);
        assert_eq!(
            patient_access(&doc, 2, &PatientRelation::default()),
            Err(Denial::NotPermitted)
        );
        let primary = PatientRelation { is_primary_doctor: true, ..Default::default() };
        assert_eq!(patient_access(&doc, 2, &primary), Ok(()));
        let assigned = PatientRelation { is_assigned: true, ..Default::default() };
        assert_eq!(patient_access(&doc, 2, &assigned), Ok(()));
    }

    #[test]
    fn doctor_relation_flags_do_not_help_patients() {
        let rel = PatientRelation {
            is_primary_doctor: true,
            is_assigned: true,
            own_patient_id: None,
        };
        assert_eq!(patient_access(&patient(8), 2, &rel), Err(Denial::NotPermitted));
    }

    #[test]
    fn ownership_checks() {
        assert_eq!(self_or_admin(&ctx(Role::Patient), 10), Ok(()));
        assert_eq!(self_or_admin(&ctx(Role::Patient), 11), Err(Denial::NotPermitted));
        assert_eq!(self_or_admin(&ctx(Role::Admin), 11), Ok(()));

        assert_eq!(own_doctor_or_admin(&doctor(5), 5), Ok(()));
        assert_eq!(own_doctor_or_admin(&doctor(5), 6), Err(Denial::NotPermitted));
        assert_eq!(own_doctor_or_admin(&patient(5), 5), Err(Denial::NotPermitted));
    }

    #[test]
    fn list_scope_follows_role() {
        assert_eq!(list_scope(&ctx(Role::Admin)), ListScope::All);
        assert_eq!(list_scope(&doctor(3)), ListScope::Doctor(3));
        assert_eq!(list_scope(&patient(9)), ListScope::Patient(9));
        assert_eq!(list_scope(&ctx(Role::Doctor)), ListScope::Nothing);
    }
}
