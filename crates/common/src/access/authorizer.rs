//! Read and mutation authorization for single theses

use super::visibility::{build_thesis_query, ThesisView};
use super::ThesisFacts;
use crate::auth::Actor;
use crate::errors::{AppError, Result};
use crate::metrics;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Pure decision. For create, `facts` describes the proposed thesis.
pub fn can_access(actor: &Actor, facts: &ThesisFacts, action: Action) -> bool {
    match action {
        Action::Read => build_thesis_query(actor, ThesisView::Listing).admits(facts),
        Action::Create => actor.has_program_authority(&facts.program_id),
        Action::Update | Action::Delete => {
            actor.has_program_authority(&facts.program_id)
                || facts.supervisor_user_ids.iter().any(|id| id == actor.user_id())
        }
    }
}

/// Authorize an action on a thesis.
///
/// Denied reads, updates and deletes are reported as a missing thesis so
/// ids cannot be probed. A denied create has nothing to hide and gets a 403
/// on `programId`.
pub fn authorize(actor: &Actor, facts: &ThesisFacts, action: Action, thesis_id: &str) -> Result<()> {
    if can_access(actor, facts, action) {
        return Ok(());
    }

    warn!(
        user_id = %actor.user_id(),
        role = actor.role.as_str(),
        action = action.as_str(),
        thesis_id = %thesis_id,
        program_id = %facts.program_id,
        "Thesis access denied"
    );

    match action {
        Action::Create => {
            metrics::record_authorization_denial("create_denied");
            Err(AppError::forbidden(
                "programId",
                "User is not authorized to create theses in this program",
            ))
        }
        _ => {
            metrics::record_authorization_denial("not_visible");
            Err(AppError::thesis_not_found(thesis_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::actor;
    use crate::auth::Role;
    use axum::http::StatusCode;

    fn thesis(program_id: &str, supervisors: &[&str]) -> ThesisFacts {
        ThesisFacts {
            program_id: program_id.to_string(),
            supervisor_user_ids: supervisors.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn manager_of(id: &str, program: &str) -> Actor {
        actor(id, Role::ProgramManager([program.to_string()].into_iter().collect()))
    }

    #[test]
    fn test_admin_may_do_everything() {
        let admin = actor("admin", Role::Admin);
        let facts = thesis("P1", &[]);
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            assert!(can_access(&admin, &facts, action));
        }
    }

    #[test]
    fn test_manager_scoped_to_program() {
        let manager = manager_of("manager", "P1");
        assert!(can_access(&manager, &thesis("P1", &[]), Action::Delete));
        assert!(can_access(&manager, &thesis("P1", &[]), Action::Create));
        assert!(!can_access(&manager, &thesis("P2", &[]), Action::Update));
        assert!(!can_access(&manager, &thesis("P2", &[]), Action::Create));
        assert!(can_access(&manager, &thesis("P2", &["manager"]), Action::Update));
    }

    #[test]
    fn test_supervisor_edits_but_cannot_create() {
        let teacher = actor("teacher1", Role::Supervisor);
        let supervised = thesis("P1", &["teacher1"]);
        assert!(can_access(&teacher, &supervised, Action::Read));
        assert!(can_access(&teacher, &supervised, Action::Update));
        assert!(can_access(&teacher, &supervised, Action::Delete));
        assert!(!can_access(&teacher, &supervised, Action::Create));
    }

    #[test]
    fn test_denial_hides_existence() {
        let outsider = actor("teacher2", Role::Supervisor);
        let facts = thesis("P1", &["teacher1"]);

        for action in [Action::Read, Action::Update, Action::Delete] {
            let err = authorize(&outsider, &facts, action, "some-id").unwrap_err();
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }

        let err = authorize(&outsider, &facts, Action::Create, "new").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
