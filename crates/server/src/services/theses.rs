//! Thesis service: orchestrates authorization, reconciliation and persistence
//! for the thesis endpoints.
//!
//! Every mutation follows the same order: validate the payload, load and
//! authorize the stored thesis, run the status guard against the stored and
//! submitted programs, plan the changes, then write everything in one
//! transaction. Nothing is written before the last check has passed.

use chrono::{DateTime, NaiveDate, Utc};
use prethesis_common::{
    access::{authorize, build_thesis_query, guard_status, Action, ThesisFacts, ThesisView},
    attachments::{plan_attachments, remove_files_best_effort, store_uploads, FileStore, StoredAttachment, Upload},
    auth::Actor,
    db::{
        models::{Attachment, Thesis, ThesisStatus},
        views::ThesisData,
        DbPool, Repository, ThesisFields,
    },
    errors::{AppError, Result},
    metrics,
    reconcile::{
        reconcile_authors, reconcile_graders, reconcile_supervisions, GraderInput, KnownUsers,
        PeopleQuery, PersonInput, SupervisionInput,
    },
};
use sea_orm::{ConnectionTrait, DatabaseTransaction};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// The `json` part of a thesis create/update request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ThesisInput {
    #[validate(length(min = 1, message = "Program is required"))]
    pub program_id: String,

    #[serde(default)]
    pub study_track_id: Option<String>,

    #[validate(length(min = 1, max = 1000, message = "Topic is required"))]
    pub topic: String,

    pub status: ThesisStatus,

    #[serde(deserialize_with = "flexible_date")]
    pub start_date: DateTime<Utc>,

    #[serde(default, deserialize_with = "flexible_optional_date")]
    pub target_date: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(nested)]
    pub supervisions: Vec<SupervisionInput>,

    #[serde(default)]
    #[validate(nested)]
    pub graders: Vec<GraderInput>,

    #[serde(default)]
    #[validate(nested)]
    pub authors: Vec<PersonInput>,
}

impl ThesisInput {
    fn fields(&self) -> ThesisFields {
        ThesisFields {
            program_id: self.program_id.clone(),
            study_track_id: self.study_track_id.clone().filter(|id| !id.is_empty()),
            topic: self.topic.trim().to_string(),
            status: self.status,
            start_date: self.start_date,
            target_date: self.target_date,
        }
    }

    fn people(&self) -> impl Iterator<Item = &PersonInput> {
        self.supervisions
            .iter()
            .filter_map(|s| s.user.as_ref())
            .chain(self.graders.iter().filter_map(|g| g.user.as_ref()))
            .chain(self.authors.iter())
    }
}

/// Accept RFC 3339 timestamps and plain `YYYY-MM-DD` dates
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

fn flexible_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

fn flexible_optional_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw))),
    }
}

/// Thesis ids that do not parse name no thesis
pub fn parse_thesis_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::thesis_not_found(raw))
}

/// Thesis use cases over a database pool and a file store
pub struct ThesisService {
    repo: Repository,
    files: Arc<dyn FileStore>,
}

impl ThesisService {
    pub fn new(db: DbPool, files: Arc<dyn FileStore>) -> Self {
        Self {
            repo: Repository::new(db),
            files,
        }
    }

    /// Theses visible to the caller, by target date
    pub async fn list(&self, actor: &Actor, view: ThesisView) -> Result<Vec<ThesisData>> {
        if view == ThesisView::Listing {
            actor.require_employee()?;
        }

        let scope = build_thesis_query(actor, view);
        let theses = self.repo.list_theses(&scope).await?;
        self.repo.thesis_data(&theses).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ThesisData> {
        actor.require_employee()?;

        let conn = self.repo.pool().read();
        let thesis = Repository::find_thesis(conn, id)
            .await?
            .ok_or_else(|| AppError::thesis_not_found(id))?;

        let facts = Repository::thesis_facts(conn, &thesis).await?;
        authorize(actor, &facts, Action::Read, &id.to_string())?;

        self.single_view(conn, thesis).await
    }

    pub async fn create(&self, actor: &Actor, input: ThesisInput, uploads: Vec<Upload>) -> Result<ThesisData> {
        actor.require_employee()?;
        input.validate().map_err(AppError::from_validation)?;
        guard_status(actor, &[input.program_id.as_str()], input.status)?;

        let proposed = ThesisFacts {
            program_id: input.program_id.clone(),
            supervisor_user_ids: Vec::new(),
        };
        authorize(actor, &proposed, Action::Create, "new")?;

        let attachment_plan = plan_attachments(&[], &uploads, true)?;

        let txn = self.repo.pool().begin().await?;
        let changes = plan_participants(&txn, &input, None).await?;

        let stored = store_uploads(self.files.as_ref(), &uploads).await?;

        let written: Result<Thesis> = async {
            let thesis = Repository::insert_thesis(&txn, input.fields()).await?;
            changes.apply(&txn, thesis.id).await?;
            Repository::replace_attachments(&txn, thesis.id, &attachment_plan.superseded, &stored).await?;
            Ok(thesis)
        }
        .await;

        let thesis = self.commit_or_discard(txn, written, &stored).await?;

        metrics::record_thesis_mutation("create");
        info!(
            thesis_id = %thesis.id,
            program_id = %thesis.program_id,
            user_id = %actor.user_id(),
            "Thesis created"
        );

        self.single_view(self.repo.pool().write(), thesis).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        input: ThesisInput,
        uploads: Vec<Upload>,
    ) -> Result<ThesisData> {
        actor.require_employee()?;
        input.validate().map_err(AppError::from_validation)?;

        let txn = self.repo.pool().begin().await?;

        let current = Repository::find_thesis(&txn, id)
            .await?
            .ok_or_else(|| AppError::thesis_not_found(id))?;
        let facts = Repository::thesis_facts(&txn, &current).await?;
        authorize(actor, &facts, Action::Update, &id.to_string())?;
        guard_status(
            actor,
            &[current.program_id.as_str(), input.program_id.as_str()],
            input.status,
        )?;

        let existing_attachments = Repository::attachments_of(&txn, &[id]).await?;
        let attachment_plan = plan_attachments(&existing_attachments, &uploads, false)?;

        let changes = plan_participants(&txn, &input, Some(id)).await?;

        let stored = store_uploads(self.files.as_ref(), &uploads).await?;

        let written: Result<Thesis> = async {
            let thesis = Repository::update_thesis(&txn, current, input.fields()).await?;
            changes.apply(&txn, id).await?;
            Repository::replace_attachments(&txn, id, &attachment_plan.superseded, &stored).await?;
            Ok(thesis)
        }
        .await;

        let thesis = self.commit_or_discard(txn, written, &stored).await?;

        remove_files_best_effort(
            self.files.as_ref(),
            attachment_plan.superseded.into_iter().map(|a| a.filename),
        )
        .await;

        metrics::record_thesis_mutation("update");
        info!(
            thesis_id = %thesis.id,
            status = %thesis.status,
            user_id = %actor.user_id(),
            "Thesis updated"
        );

        self.single_view(self.repo.pool().write(), thesis).await
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require_employee()?;

        let txn = self.repo.pool().begin().await?;

        let thesis = Repository::find_thesis(&txn, id)
            .await?
            .ok_or_else(|| AppError::thesis_not_found(id))?;
        let facts = Repository::thesis_facts(&txn, &thesis).await?;
        authorize(actor, &facts, Action::Delete, &id.to_string())?;

        let removed: Vec<Attachment> = Repository::delete_thesis(&txn, id).await?;
        txn.commit().await?;

        remove_files_best_effort(self.files.as_ref(), removed.into_iter().map(|a| a.filename)).await;

        metrics::record_thesis_mutation("delete");
        info!(thesis_id = %id, user_id = %actor.user_id(), "Thesis deleted");

        Ok(())
    }

    /// A stored attachment with its bytes, if the caller may read its thesis
    pub async fn attachment(&self, actor: &Actor, filename: &str) -> Result<(Attachment, Vec<u8>)> {
        let not_found = || AppError::NotFound {
            resource_type: "Attachment".to_string(),
            id: filename.to_string(),
        };

        let attachment = self
            .repo
            .find_attachment_by_filename(filename)
            .await?
            .ok_or_else(not_found)?;

        let conn = self.repo.pool().read();
        let thesis = Repository::find_thesis(conn, attachment.thesis_id)
            .await?
            .ok_or_else(not_found)?;
        let facts = Repository::thesis_facts(conn, &thesis).await?;
        authorize(actor, &facts, Action::Read, &thesis.id.to_string()).map_err(|_| not_found())?;

        let contents = self.files.read(&attachment.filename).await?;
        Ok((attachment, contents))
    }

    async fn single_view<C: ConnectionTrait>(&self, conn: &C, thesis: Thesis) -> Result<ThesisData> {
        let theses = vec![thesis];
        let children = Repository::load_children(conn, &theses).await?;
        children
            .assemble(&theses)
            .pop()
            .ok_or_else(|| AppError::Internal {
                message: "Thesis view could not be assembled".to_string(),
            })
    }

    /// Commit the writes, or roll back and drop the files stored for them
    async fn commit_or_discard(
        &self,
        txn: DatabaseTransaction,
        written: Result<Thesis>,
        stored: &[StoredAttachment],
    ) -> Result<Thesis> {
        let outcome = match written {
            Ok(thesis) => txn.commit().await.map(|_| thesis).map_err(AppError::from),
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            remove_files_best_effort(self.files.as_ref(), stored.iter().map(|s| s.filename.clone())).await;
        }

        outcome
    }
}

/// Participant changes planned before any write
struct ParticipantChanges {
    supervisions: prethesis_common::reconcile::SupervisionPlan,
    graders: prethesis_common::reconcile::GraderPlan,
    authors: Vec<String>,
}

/// Check program references and reconcile supervisors, graders and authors.
/// `thesis_id` is `None` on create.
async fn plan_participants<C: ConnectionTrait>(
    conn: &C,
    input: &ThesisInput,
    thesis_id: Option<Uuid>,
) -> Result<ParticipantChanges> {
    let program = Repository::find_program(conn, &input.program_id)
        .await?
        .ok_or_else(|| AppError::validation("programId", "Program not found"))?;

    if let Some(track_id) = input.study_track_id.as_deref().filter(|id| !id.is_empty()) {
        let track = Repository::find_study_track(conn, track_id).await?;
        if track.map(|t| t.program_id) != Some(program.id.clone()) {
            return Err(AppError::validation(
                "studyTrackId",
                "Study track does not belong to the program",
            ));
        }
    }

    let (existing_supervisions, existing_graders) = match thesis_id {
        Some(id) => (
            Repository::supervisions_of(conn, &[id]).await?,
            Repository::graders_of(conn, &[id]).await?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    let referenced = Repository::find_referenced_users(conn, &PeopleQuery::collect(input.people())).await?;
    let mut known = KnownUsers::new(&referenced);

    let supervisions = reconcile_supervisions(&existing_supervisions, &input.supervisions, &known)?;
    known.register_new(&supervisions.external_users_to_create);
    let graders = reconcile_graders(&existing_graders, &input.graders, &known)?;
    let authors = reconcile_authors(&input.authors, &known)?;

    Ok(ParticipantChanges {
        supervisions,
        graders,
        authors,
    })
}

impl ParticipantChanges {
    async fn apply<C: ConnectionTrait>(&self, conn: &C, thesis_id: Uuid) -> Result<()> {
        Repository::create_external_users(conn, &self.supervisions.external_users_to_create).await?;
        Repository::create_external_users(conn, &self.graders.external_users_to_create).await?;
        Repository::apply_supervision_plan(conn, thesis_id, &self.supervisions).await?;
        Repository::apply_grader_plan(conn, thesis_id, &self.graders).await?;
        Repository::replace_authors(conn, thesis_id, &self.authors).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            parse_date("2024-05-01").map(|d| d.to_rfc3339()),
            Some("2024-05-01T00:00:00+00:00".to_string())
        );
        assert!(parse_date("2024-05-01T10:00:00.000Z").is_some());
        assert!(parse_date("tomorrow").is_none());
    }

    #[test]
    fn test_thesis_input_from_client_json() {
        let input: ThesisInput = serde_json::from_value(serde_json::json!({
            "programId": "MH30_001",
            "studyTrackId": "",
            "topic": "Graph rewriting",
            "status": "PLANNING",
            "startDate": "2024-01-01",
            "targetDate": null,
            "supervisions": [
                { "user": { "id": "teacher1" }, "percentage": 50, "isExternal": false },
                { "user": { "firstName": "Ext", "lastName": "Ernal", "email": "ext@example.org" },
                  "percentage": 50, "isExternal": true }
            ],
            "graders": [{ "user": { "id": "teacher2" }, "isPrimaryGrader": true }],
            "authors": [{ "id": "student1" }]
        }))
        .unwrap();

        assert!(input.validate().is_ok());
        assert_eq!(input.fields().study_track_id, None);
        assert_eq!(input.people().count(), 4);
    }

    #[test]
    fn test_invalid_percentage_fails_validation() {
        let input: ThesisInput = serde_json::from_value(serde_json::json!({
            "programId": "P1",
            "topic": "T",
            "status": "PLANNING",
            "startDate": "2024-01-01",
            "supervisions": [{ "user": { "id": "teacher1" }, "percentage": 150 }]
        }))
        .unwrap();

        let err = AppError::from_validation(input.validate().unwrap_err());
        match err {
            AppError::Validation { fields, .. } => assert!(fields.contains_key("supervisions")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_id_is_not_found() {
        let err = parse_thesis_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
