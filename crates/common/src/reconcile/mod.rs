//! Reconciliation of submitted thesis participants against stored rows
//!
//! Everything here is pure: callers look up the referenced users, run the
//! planners, then apply the plans inside one transaction.

mod graders;
mod people;
mod supervisions;

pub use graders::{
    reconcile_authors, reconcile_graders, removed_authors, GraderInput, GraderPlan, GraderRow,
};
pub use people::{KnownUsers, NewExternalUser, PeopleQuery, PersonInput};
pub use supervisions::{
    distribute_percentages, reconcile_supervisions, SupervisionInput, SupervisionPlan,
    SupervisionRow,
};
