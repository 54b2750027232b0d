//! JSON shapes of theses and users as the API returns them

use crate::db::models::{
    Attachment, AttachmentLabel, Author, Grader, Supervision, Thesis, ThesisStatus, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionData {
    pub user: UserData,
    pub percentage: i32,
    pub is_external: bool,
    pub is_primary_supervisor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraderData {
    pub user: UserData,
    pub is_primary_grader: bool,
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub filename: String,
    /// Original upload name
    pub name: String,
    pub mimetype: String,
}

impl From<&Attachment> for AttachmentData {
    fn from(attachment: &Attachment) -> Self {
        Self {
            filename: attachment.filename.clone(),
            name: attachment.originalname.clone(),
            mimetype: attachment.mimetype.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesisData {
    pub id: Uuid,
    pub program_id: String,
    pub study_track_id: Option<String>,
    pub topic: String,
    pub status: ThesisStatus,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub supervisions: Vec<SupervisionData>,
    pub authors: Vec<UserData>,
    pub graders: Vec<GraderData>,
    pub research_plan: Option<AttachmentData>,
    pub ways_of_working: Option<AttachmentData>,
}

/// Everything loaded for a batch of theses, keyed for assembly
#[derive(Debug, Default)]
pub struct ThesisChildren {
    pub supervisions: Vec<Supervision>,
    pub graders: Vec<Grader>,
    pub authors: Vec<Author>,
    pub attachments: Vec<Attachment>,
    pub users: HashMap<String, User>,
}

impl ThesisChildren {
    /// Assemble response objects in the order of `theses`.
    ///
    /// Rows pointing at a user that is not loaded are skipped.
    pub fn assemble(&self, theses: &[Thesis]) -> Vec<ThesisData> {
        theses.iter().map(|thesis| self.assemble_one(thesis)).collect()
    }

    fn user(&self, id: &str) -> Option<UserData> {
        self.users.get(id).map(UserData::from)
    }

    fn assemble_one(&self, thesis: &Thesis) -> ThesisData {
        let mut supervisions: Vec<SupervisionData> = self
            .supervisions
            .iter()
            .filter(|s| s.thesis_id == thesis.id)
            .filter_map(|s| {
                Some(SupervisionData {
                    user: self.user(&s.user_id)?,
                    percentage: s.percentage,
                    is_external: s.is_external,
                    is_primary_supervisor: s.is_primary_supervisor,
                })
            })
            .collect();
        supervisions.sort_by(|a, b| {
            b.is_primary_supervisor
                .cmp(&a.is_primary_supervisor)
                .then_with(|| a.user.id.cmp(&b.user.id))
        });

        let mut graders: Vec<GraderData> = self
            .graders
            .iter()
            .filter(|g| g.thesis_id == thesis.id)
            .filter_map(|g| {
                Some(GraderData {
                    user: self.user(&g.user_id)?,
                    is_primary_grader: g.is_primary_grader,
                    is_external: g.is_external,
                })
            })
            .collect();
        graders.sort_by(|a, b| b.is_primary_grader.cmp(&a.is_primary_grader));

        let authors = self
            .authors
            .iter()
            .filter(|a| a.thesis_id == thesis.id)
            .filter_map(|a| self.user(&a.user_id))
            .collect();

        let attachment = |label: AttachmentLabel| {
            self.attachments
                .iter()
                .find(|a| a.thesis_id == thesis.id && a.label == label)
                .map(AttachmentData::from)
        };

        ThesisData {
            id: thesis.id,
            program_id: thesis.program_id.clone(),
            study_track_id: thesis.study_track_id.clone(),
            topic: thesis.topic.clone(),
            status: thesis.status,
            start_date: thesis.start_date,
            target_date: thesis.target_date,
            supervisions,
            authors,
            graders,
            research_plan: attachment(AttachmentLabel::ResearchPlan),
            ways_of_working: attachment(AttachmentLabel::WaysOfWorking),
        }
    }
}
