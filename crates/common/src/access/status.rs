//! Status transition table
//!
//! Program authority (admin, or manager of the thesis program) may set any
//! status. Every other editor may only move a thesis into or keep it in
//! PLANNING. When an update moves a thesis between programs, authority is
//! needed over both of them.

use crate::auth::Actor;
use crate::db::models::ThesisStatus;
use crate::errors::{AppError, Result};
use crate::metrics;
use tracing::warn;

/// What kind of rights the caller holds over a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Program,
    Editor,
}

struct Rule {
    authority: Authority,
    targets: &'static [ThesisStatus],
}

const TRANSITIONS: &[Rule] = &[
    Rule {
        authority: Authority::Program,
        targets: &[
            ThesisStatus::Planning,
            ThesisStatus::Started,
            ThesisStatus::InProgress,
            ThesisStatus::Completed,
            ThesisStatus::Cancelled,
        ],
    },
    Rule {
        authority: Authority::Editor,
        targets: &[ThesisStatus::Planning],
    },
];

pub fn authority_over(actor: &Actor, program_id: &str) -> Authority {
    if actor.has_program_authority(program_id) {
        Authority::Program
    } else {
        Authority::Editor
    }
}

pub fn may_set_status(authority: Authority, target: ThesisStatus) -> bool {
    TRANSITIONS
        .iter()
        .any(|rule| rule.authority == authority && rule.targets.contains(&target))
}

/// Weakest authority the caller holds over all of `program_ids`
pub fn authority_over_all(actor: &Actor, program_ids: &[&str]) -> Authority {
    if program_ids.iter().all(|id| authority_over(actor, id) == Authority::Program) {
        Authority::Program
    } else {
        Authority::Editor
    }
}

/// Check the submitted status against every program the thesis belongs to
/// before and after the change
pub fn guard_status(actor: &Actor, program_ids: &[&str], target: ThesisStatus) -> Result<()> {
    if may_set_status(authority_over_all(actor, program_ids), target) {
        return Ok(());
    }

    warn!(
        user_id = %actor.user_id(),
        program_ids = ?program_ids,
        status = %target,
        "Status change denied"
    );
    metrics::record_authorization_denial("status_guard");

    Err(AppError::status_change_denied())
}
