//! Typed SQL wrappers, one module per table family.
//!
//! Functions that take `impl PgExecutor` may run on the pool or inside a
//! transaction (`&mut *tx`).

pub mod appointments;
pub mod assignments;
pub mod centers;
pub mod consultations;
pub mod doctors;
pub mod foot_evaluations;
pub mod lab_results;
pub mod notifications;
pub mod patients;
pub mod reports;
pub mod treatments;
pub mod users;

use crate::policy::ListScope;

/// Splits a list scope into `(doctor, patient)` filters for
/// `($n::int IS NULL OR col = $n)` clauses. `None` means the caller sees nothing.
pub(crate) fn scope_filters(scope: ListScope) -> Option<(Option<i32>, Option<i32>)> {
    match scope {
        ListScope::All => Some((None, None)),
        ListScope::Doctor(id) => Some((Some(id), None)),
        ListScope::Patient(id) => Some((None, Some(id))),
        ListScope::Nothing => None,
    }
}
