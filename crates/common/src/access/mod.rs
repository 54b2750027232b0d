//! Thesis access control
//!
//! - `visibility`: the read predicate for thesis listings
//! - `authorizer`: per-thesis read/create/update/delete decisions
//! - `status`: who may set which thesis status

mod authorizer;
pub mod status;
mod visibility;

pub use authorizer::{authorize, can_access, Action};
pub use status::guard_status;
pub use visibility::{build_thesis_query, ThesisScope, ThesisView};

/// The parts of a thesis access decisions depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThesisFacts {
    pub program_id: String,
    pub supervisor_user_ids: Vec<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::auth::{Actor, Role};
    use crate::db::models::User;
    use chrono::Utc;

    pub fn actor(id: &str, role: Role) -> Actor {
        let now = Utc::now();
        let user = User {
            id: id.to_string(),
            username: id.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            language: "fi".to_string(),
            is_admin: matches!(role, Role::Admin),
            is_external: false,
            iam_groups: serde_json::json!([]),
            favorite_program_ids: None,
            department_id: None,
            theses_table_filters: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        Actor::new(user, role)
    }
}
