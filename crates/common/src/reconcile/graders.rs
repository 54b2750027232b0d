//! Grader and author reconciliation

use super::people::{KnownUsers, NewExternalUser, PersonInput, Resolver};
use crate::db::models::{Author, Grader};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One submitted grader entry. Position decides the primary grader.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GraderInput {
    #[validate(nested)]
    pub user: Option<PersonInput>,

    #[serde(default)]
    pub is_primary_grader: bool,

    #[serde(default)]
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraderRow {
    pub user_id: String,
    pub is_primary_grader: bool,
    pub is_external: bool,
}

/// Graders are replaced wholesale: `rows` is the complete new set
#[derive(Debug, Default)]
pub struct GraderPlan {
    pub rows: Vec<GraderRow>,
    /// User ids of stored graders absent from the new set
    pub removed: Vec<String>,
    pub external_users_to_create: Vec<NewExternalUser>,
}

pub fn reconcile_graders(
    existing: &[Grader],
    submitted: &[GraderInput],
    known: &KnownUsers,
) -> Result<GraderPlan> {
    let mut resolver = Resolver::new(known);
    let mut rows: Vec<GraderRow> = Vec::with_capacity(submitted.len());

    for entry in submitted {
        let person = resolver.resolve("graders", entry.user.as_ref(), entry.is_external)?;
        if rows.iter().all(|row| row.user_id != person.user_id) {
            rows.push(GraderRow {
                is_primary_grader: rows.is_empty(),
                user_id: person.user_id,
                is_external: person.is_external,
            });
        }
    }

    let removed = existing
        .iter()
        .filter(|g| rows.iter().all(|row| row.user_id != g.user_id))
        .map(|g| g.user_id.clone())
        .collect();

    Ok(GraderPlan {
        rows,
        removed,
        external_users_to_create: resolver.into_new_users(),
    })
}

/// Authors are replaced wholesale: the result is the deduplicated user id list
pub fn reconcile_authors(submitted: &[PersonInput], known: &KnownUsers) -> Result<Vec<String>> {
    let mut ids: Vec<String> = Vec::with_capacity(submitted.len());

    for person in submitted {
        let id = person
            .id
            .as_deref()
            .ok_or_else(|| AppError::validation("authors", "Author must be an existing user"))?;
        if !known.contains(id) {
            return Err(AppError::validation("authors", format!("Unknown user {}", id)));
        }
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}

/// Author ids present before but not after a replacement
pub fn removed_authors(existing: &[Author], next: &[String]) -> Vec<String> {
    existing
        .iter()
        .filter(|a| !next.contains(&a.user_id))
        .map(|a| a.user_id.clone())
        .collect()
}
