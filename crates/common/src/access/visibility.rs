//! Which theses a caller may read

use super::ThesisFacts;
use crate::auth::{Actor, Role};
use crate::db::models::{SupervisionColumn, SupervisionEntity, ThesisColumn};
use sea_orm::sea_query::Query;
use sea_orm::{ColumnTrait, Condition};
use std::collections::BTreeSet;

/// Which thesis list is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThesisView {
    /// The main theses table
    Listing,
    /// "My theses": only those the caller supervises
    Supervised,
}

/// Row restriction for a thesis query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThesisScope {
    All,
    /// `program_id IN program_ids OR caller supervises`
    Filter {
        program_ids: BTreeSet<String>,
        supervisor_id: String,
    },
    Nothing,
}

/// Build the read predicate for a caller and view
pub fn build_thesis_query(actor: &Actor, view: ThesisView) -> ThesisScope {
    let supervised_by = |program_ids: BTreeSet<String>| ThesisScope::Filter {
        program_ids,
        supervisor_id: actor.user_id().to_string(),
    };

    match (view, &actor.role) {
        (ThesisView::Supervised, _) => supervised_by(BTreeSet::new()),
        (ThesisView::Listing, Role::Admin) => ThesisScope::All,
        (ThesisView::Listing, Role::ProgramManager(ids)) => supervised_by(ids.clone()),
        (ThesisView::Listing, Role::Supervisor) => supervised_by(BTreeSet::new()),
        (ThesisView::Listing, Role::Anonymous) => ThesisScope::Nothing,
    }
}

impl ThesisScope {
    /// SeaORM condition for this scope; `None` means unrestricted.
    ///
    /// The supervision part is a subquery inside one OR so a thesis matching
    /// both branches is returned once.
    pub fn condition(&self) -> Option<Condition> {
        match self {
            ThesisScope::All => None,
            ThesisScope::Nothing => Some(Condition::all().add(ThesisColumn::Id.is_null())),
            ThesisScope::Filter {
                program_ids,
                supervisor_id,
            } => {
                let supervised = ThesisColumn::Id.in_subquery(
                    Query::select()
                        .column(SupervisionColumn::ThesisId)
                        .from(SupervisionEntity)
                        .and_where(SupervisionColumn::UserId.eq(supervisor_id.as_str()))
                        .to_owned(),
                );

                let mut condition = Condition::any().add(supervised);
                if !program_ids.is_empty() {
                    condition = condition.add(ThesisColumn::ProgramId.is_in(program_ids.iter().cloned()));
                }
                Some(condition)
            }
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ThesisScope::Nothing)
    }

    /// Evaluate the scope against one loaded thesis
    pub fn admits(&self, facts: &ThesisFacts) -> bool {
        match self {
            ThesisScope::All => true,
            ThesisScope::Nothing => false,
            ThesisScope::Filter {
                program_ids,
                supervisor_id,
            } => {
                program_ids.contains(&facts.program_id)
                    || facts.supervisor_user_ids.iter().any(|id| id == supervisor_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::actor;

    fn facts(program_id: &str, supervisors: &[&str]) -> ThesisFacts {
        ThesisFacts {
            program_id: program_id.to_string(),
            supervisor_user_ids: supervisors.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_admin_sees_everything() {
        let scope = build_thesis_query(&actor("admin", Role::Admin), ThesisView::Listing);
        assert_eq!(scope, ThesisScope::All);
        assert!(scope.condition().is_none());
        assert!(scope.admits(&facts("P9", &[])));
    }

    #[test]
    fn test_manager_sees_managed_and_supervised() {
        let role = Role::ProgramManager(["P1".to_string()].into_iter().collect());
        let scope = build_thesis_query(&actor("manager", role), ThesisView::Listing);

        assert!(scope.admits(&facts("P1", &[])));
        assert!(scope.admits(&facts("P2", &["manager"])));
        assert!(!scope.admits(&facts("P2", &["teacher1"])));
        assert!(scope.condition().is_some());
    }

    #[test]
    fn test_supervisor_sees_only_supervised() {
        let scope = build_thesis_query(&actor("teacher1", Role::Supervisor), ThesisView::Listing);
        assert!(scope.admits(&facts("P1", &["teacher2", "teacher1"])));
        assert!(!scope.admits(&facts("P1", &["teacher2"])));
    }

    #[test]
    fn test_anonymous_listing_is_empty_but_supervised_view_is_not() {
        let student = actor("student", Role::Anonymous);

        let scope = build_thesis_query(&student, ThesisView::Listing);
        assert!(scope.is_nothing());
        assert!(!scope.admits(&facts("P1", &["student"])));

        let scope = build_thesis_query(&student, ThesisView::Supervised);
        assert!(scope.admits(&facts("P1", &["student"])));
    }

    #[test]
    fn test_supervised_view_ignores_management() {
        let role = Role::ProgramManager(["P1".to_string()].into_iter().collect());
        let scope = build_thesis_query(&actor("manager", role), ThesisView::Supervised);
        assert!(!scope.admits(&facts("P1", &[])));
    }
}
