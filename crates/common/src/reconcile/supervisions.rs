//! Supervision reconciliation
//!
//! Turns a submitted supervisor list into create/update/delete sets against
//! the stored rows. Percentages are always redistributed evenly so the
//! stored shares sum to exactly 100.

use super::people::{KnownUsers, NewExternalUser, PersonInput, Resolver};
use crate::db::models::Supervision;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

const FIELD: &str = "supervisions";

/// One submitted supervisor entry
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionInput {
    #[validate(nested)]
    pub user: Option<PersonInput>,

    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "Percentage must be between 0 and 100"))]
    pub percentage: i32,

    #[serde(default)]
    pub is_external: bool,

    #[serde(default)]
    pub is_primary_supervisor: bool,
}

/// A supervision row as it should be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisionRow {
    pub user_id: String,
    pub percentage: i32,
    pub is_external: bool,
    pub is_primary_supervisor: bool,
}

#[derive(Debug, Default)]
pub struct SupervisionPlan {
    pub to_create: Vec<SupervisionRow>,
    pub to_update: Vec<SupervisionRow>,
    /// User ids whose supervision row goes away
    pub to_delete: Vec<String>,
    pub external_users_to_create: Vec<NewExternalUser>,
}

/// Even shares of 100 over `n` supervisors; the remainder goes to the first entries
pub fn distribute_percentages(n: usize) -> Vec<i32> {
    if n == 0 {
        return Vec::new();
    }
    let n_i32 = n as i32;
    let base = 100 / n_i32;
    let remainder = (100 % n_i32) as usize;

    (0..n)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Plan the supervision changes for one thesis.
///
/// Duplicate user ids collapse into their first occurrence. When no entry
/// is flagged primary, the first supervisor becomes primary.
pub fn reconcile_supervisions(
    existing: &[Supervision],
    submitted: &[SupervisionInput],
    known: &KnownUsers,
) -> Result<SupervisionPlan> {
    let mut resolver = Resolver::new(known);
    let mut rows: Vec<SupervisionRow> = Vec::with_capacity(submitted.len());

    for entry in submitted {
        if !(0..=100).contains(&entry.percentage) {
            return Err(AppError::validation(
                FIELD,
                "Percentage must be between 0 and 100",
            ));
        }

        let person = resolver.resolve(FIELD, entry.user.as_ref(), entry.is_external)?;

        match rows.iter_mut().find(|row| row.user_id == person.user_id) {
            Some(first) => first.is_primary_supervisor |= entry.is_primary_supervisor,
            None => rows.push(SupervisionRow {
                user_id: person.user_id,
                percentage: 0,
                is_external: person.is_external,
                is_primary_supervisor: entry.is_primary_supervisor,
            }),
        }
    }

    if rows.is_empty() {
        return Err(AppError::validation(FIELD, "At least one supervisor is required"));
    }

    let shares = distribute_percentages(rows.len());
    for (row, share) in rows.iter_mut().zip(shares) {
        row.percentage = share;
    }

    let primary = rows
        .iter()
        .position(|row| row.is_primary_supervisor)
        .unwrap_or(0);
    for (i, row) in rows.iter_mut().enumerate() {
        row.is_primary_supervisor = i == primary;
    }

    let total: i32 = rows.iter().map(|row| row.percentage).sum();
    if total != 100 {
        return Err(AppError::validation(FIELD, "Supervision percentages must sum to 100"));
    }

    let stored: HashMap<&str, &Supervision> =
        existing.iter().map(|s| (s.user_id.as_str(), s)).collect();

    let mut plan = SupervisionPlan::default();

    for row in &rows {
        match stored.get(row.user_id.as_str()) {
            None => plan.to_create.push(row.clone()),
            Some(current)
                if current.percentage != row.percentage
                    || current.is_external != row.is_external
                    || current.is_primary_supervisor != row.is_primary_supervisor =>
            {
                plan.to_update.push(row.clone())
            }
            Some(_) => {}
        }
    }

    plan.to_delete = existing
        .iter()
        .filter(|s| !rows.iter().any(|row| row.user_id == s.user_id))
        .map(|s| s.user_id.clone())
        .collect();

    plan.external_users_to_create = resolver.into_new_users();

    Ok(plan)
}
