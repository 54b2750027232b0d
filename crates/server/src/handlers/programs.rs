//! Program handlers

use axum::{
    extract::{Query, State},
    Json,
};
use prethesis_common::{
    auth::Actor,
    db::{
        models::{Program, StudyTrack},
        Repository,
    },
    errors::Result,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramQuery {
    #[serde(default)]
    pub include_not_managed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyTrackResponse {
    pub id: String,
    pub name: serde_json::Value,
    pub program_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramResponse {
    pub id: String,
    pub name: serde_json::Value,
    pub level: String,
    pub international: bool,
    pub enabled: bool,
    pub study_tracks: Vec<StudyTrackResponse>,
}

impl From<(Program, Vec<StudyTrack>)> for ProgramResponse {
    fn from((program, tracks): (Program, Vec<StudyTrack>)) -> Self {
        Self {
            id: program.id,
            name: program.name,
            level: program.level,
            international: program.international,
            enabled: program.enabled,
            study_tracks: tracks
                .into_iter()
                .map(|t| StudyTrackResponse {
                    id: t.id,
                    name: t.name,
                    program_id: t.program_id,
                })
                .collect(),
        }
    }
}

/// Enabled programs. Admins, or callers passing `includeNotManaged=true`,
/// get every program; everyone else gets the programs they manage.
pub async fn list_programs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ProgramQuery>,
) -> Result<Json<Vec<ProgramResponse>>> {
    actor.require_employee()?;

    let repo = Repository::new(state.db.clone());
    let programs = if actor.is_admin() || query.include_not_managed {
        repo.list_enabled_programs(None).await?
    } else {
        let managed = actor.role.managed_program_ids().cloned().unwrap_or_default();
        repo.list_enabled_programs(Some(&managed)).await?
    };

    Ok(Json(programs.into_iter().map(ProgramResponse::from).collect()))
}
