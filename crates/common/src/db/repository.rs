//! Repository pattern for database operations
//!
//! Reads go through the pool (replica when configured). Writes that belong to
//! a thesis mutation are associated functions taking any `ConnectionTrait`,
//! so the service can run them inside one transaction.

use crate::access::{ThesisFacts, ThesisScope};
use crate::attachments::StoredAttachment;
use crate::auth::Identity;
use crate::db::models::*;
use crate::db::views::{ThesisChildren, ThesisData};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::reconcile::{GraderPlan, NewExternalUser, PeopleQuery, SupervisionPlan};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

/// Default UI language for users the SSO headers don't give one
const DEFAULT_LANGUAGE: &str = "fi";

/// Scalar thesis fields written on create and update
#[derive(Debug, Clone)]
pub struct ThesisFields {
    pub program_id: String,
    pub study_track_id: Option<String>,
    pub topic: String,
    pub status: ThesisStatus,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create or refresh the caller's user row from the identity headers.
    /// `is_admin` and user preferences are never touched.
    pub async fn upsert_sso_user(&self, identity: &Identity) -> Result<User> {
        let conn = self.write_conn();
        let groups = json!(identity.groups);

        if let Some(user) = UserEntity::find_by_id(identity.uid.clone()).one(conn).await? {
            let first_name = identity.first_name.clone().unwrap_or_else(|| user.first_name.clone());
            let last_name = identity.last_name.clone().unwrap_or_else(|| user.last_name.clone());
            let email = identity.email.clone().or_else(|| user.email.clone());
            let language = identity.language.clone().unwrap_or_else(|| user.language.clone());

            if user.first_name == first_name
                && user.last_name == last_name
                && user.email == email
                && user.language == language
                && user.iam_groups == groups
            {
                return Ok(user);
            }

            let mut active: UserActiveModel = user.into();
            active.first_name = Set(first_name);
            active.last_name = Set(last_name);
            active.email = Set(email);
            active.language = Set(language);
            active.iam_groups = Set(groups);
            active.updated_at = Set(Utc::now());

            return active.update(conn).await.map_err(Into::into);
        }

        let now = Utc::now();
        let user = UserActiveModel {
            id: Set(identity.uid.clone()),
            username: Set(identity.uid.clone()),
            first_name: Set(identity.first_name.clone().unwrap_or_default()),
            last_name: Set(identity.last_name.clone().unwrap_or_default()),
            email: Set(identity.email.clone()),
            language: Set(identity.language.clone().unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())),
            is_admin: Set(false),
            is_external: Set(false),
            iam_groups: Set(groups),
            favorite_program_ids: Set(None),
            department_id: Set(None),
            theses_table_filters: Set(json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match user.insert(conn).await.map_err(AppError::from) {
            Ok(user) => {
                debug!(user_id = %user.id, "Created user from identity headers");
                Ok(user)
            }
            // A concurrent first request inserted the same user
            Err(AppError::Conflict { .. }) => UserEntity::find_by_id(identity.uid.clone())
                .one(conn)
                .await?
                .ok_or_else(|| AppError::Internal {
                    message: format!("User {} vanished after insert conflict", identity.uid),
                }),
            Err(e) => Err(e),
        }
    }

    /// Find user by ID
    pub async fn find_user(&self, id: &str) -> Result<Option<User>> {
        UserEntity::find_by_id(id.to_string())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Programs the user manages
    pub async fn managed_program_ids(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let rows = ProgramManagementEntity::find()
            .filter(ProgramManagementColumn::UserId.eq(user_id))
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(|row| row.program_id).collect())
    }

    pub async fn set_department(&self, user: User, department_id: Option<String>) -> Result<User> {
        let mut active: UserActiveModel = user.into();
        active.department_id = Set(department_id);
        self.save_user(active).await
    }

    pub async fn set_favorite_programs(&self, user: User, program_ids: Vec<String>) -> Result<User> {
        let mut active: UserActiveModel = user.into();
        active.favorite_program_ids = Set(Some(json!(program_ids)));
        self.save_user(active).await
    }

    pub async fn set_theses_table_filters(&self, user: User, filters: serde_json::Value) -> Result<User> {
        let mut active: UserActiveModel = user.into();
        active.theses_table_filters = Set(filters);
        self.save_user(active).await
    }

    async fn save_user(&self, mut active: UserActiveModel) -> Result<User> {
        active.updated_at = Set(Utc::now());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Users a submission refers to by id or email. Internal users come
    /// first so an email shared with an external row resolves to the account.
    pub async fn find_referenced_users<C: ConnectionTrait>(
        conn: &C,
        query: &PeopleQuery,
    ) -> Result<Vec<User>> {
        if query.ids.is_empty() && query.emails.is_empty() {
            return Ok(Vec::new());
        }

        let mut condition = Condition::any();
        if !query.ids.is_empty() {
            condition = condition.add(UserColumn::Id.is_in(query.ids.iter().cloned()));
        }
        if !query.emails.is_empty() {
            condition = condition.add(UserColumn::Email.is_in(query.emails.iter().cloned()));
        }

        UserEntity::find()
            .filter(condition)
            .order_by_asc(UserColumn::IsExternal)
            .order_by_asc(UserColumn::CreatedAt)
            .all(conn)
            .await
            .map_err(Into::into)
    }

    /// Insert the external persons a reconciliation planned
    pub async fn create_external_users<C: ConnectionTrait>(
        conn: &C,
        users: &[NewExternalUser],
    ) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = users.iter().map(|user| UserActiveModel {
            id: Set(user.id.clone()),
            username: Set(user.email.clone()),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            email: Set(Some(user.email.clone())),
            language: Set(DEFAULT_LANGUAGE.to_string()),
            is_admin: Set(false),
            is_external: Set(true),
            iam_groups: Set(json!([])),
            favorite_program_ids: Set(None),
            department_id: Set(None),
            theses_table_filters: Set(json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        });

        UserEntity::insert_many(rows).exec_without_returning(conn).await?;
        debug!(count = users.len(), "Created external users");
        Ok(())
    }

    // ========================================================================
    // Program Operations
    // ========================================================================

    /// Enabled programs with their study tracks, optionally limited to `only`
    pub async fn list_enabled_programs(
        &self,
        only: Option<&BTreeSet<String>>,
    ) -> Result<Vec<(Program, Vec<StudyTrack>)>> {
        let mut select = ProgramEntity::find()
            .filter(ProgramColumn::Enabled.eq(true))
            .order_by_asc(ProgramColumn::Id);

        if let Some(ids) = only {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            select = select.filter(ProgramColumn::Id.is_in(ids.iter().cloned()));
        }

        select
            .find_with_related(StudyTrackEntity)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_program<C: ConnectionTrait>(conn: &C, id: &str) -> Result<Option<Program>> {
        ProgramEntity::find_by_id(id.to_string())
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn find_study_track<C: ConnectionTrait>(conn: &C, id: &str) -> Result<Option<StudyTrack>> {
        StudyTrackEntity::find_by_id(id.to_string())
            .one(conn)
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Thesis Reads
    // ========================================================================

    pub async fn find_thesis<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Thesis>> {
        ThesisEntity::find_by_id(id).one(conn).await.map_err(Into::into)
    }

    /// Theses within a scope, ordered by target date
    pub async fn list_theses(&self, scope: &ThesisScope) -> Result<Vec<Thesis>> {
        if scope.is_nothing() {
            return Ok(Vec::new());
        }

        let mut select = ThesisEntity::find();
        if let Some(condition) = scope.condition() {
            select = select.filter(condition);
        }

        select
            .order_by_asc(ThesisColumn::TargetDate)
            .order_by_asc(ThesisColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// What the authorizer needs to know about a stored thesis
    pub async fn thesis_facts<C: ConnectionTrait>(conn: &C, thesis: &Thesis) -> Result<ThesisFacts> {
        let supervisions = Self::supervisions_of(conn, &[thesis.id]).await?;
        Ok(ThesisFacts {
            program_id: thesis.program_id.clone(),
            supervisor_user_ids: supervisions.into_iter().map(|s| s.user_id).collect(),
        })
    }

    pub async fn supervisions_of<C: ConnectionTrait>(conn: &C, thesis_ids: &[Uuid]) -> Result<Vec<Supervision>> {
        SupervisionEntity::find()
            .filter(SupervisionColumn::ThesisId.is_in(thesis_ids.iter().copied()))
            .all(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn graders_of<C: ConnectionTrait>(conn: &C, thesis_ids: &[Uuid]) -> Result<Vec<Grader>> {
        GraderEntity::find()
            .filter(GraderColumn::ThesisId.is_in(thesis_ids.iter().copied()))
            .all(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn authors_of<C: ConnectionTrait>(conn: &C, thesis_ids: &[Uuid]) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .filter(AuthorColumn::ThesisId.is_in(thesis_ids.iter().copied()))
            .all(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn attachments_of<C: ConnectionTrait>(conn: &C, thesis_ids: &[Uuid]) -> Result<Vec<Attachment>> {
        AttachmentEntity::find()
            .filter(AttachmentColumn::ThesisId.is_in(thesis_ids.iter().copied()))
            .all(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn find_attachment_by_filename(&self, filename: &str) -> Result<Option<Attachment>> {
        AttachmentEntity::find()
            .filter(AttachmentColumn::Filename.eq(filename))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Load the children of a batch of theses with one query per table
    pub async fn load_children<C: ConnectionTrait>(conn: &C, theses: &[Thesis]) -> Result<ThesisChildren> {
        if theses.is_empty() {
            return Ok(ThesisChildren::default());
        }

        let ids: Vec<Uuid> = theses.iter().map(|t| t.id).collect();
        let supervisions = Self::supervisions_of(conn, &ids).await?;
        let graders = Self::graders_of(conn, &ids).await?;
        let authors = Self::authors_of(conn, &ids).await?;
        let attachments = Self::attachments_of(conn, &ids).await?;

        let user_ids: BTreeSet<String> = supervisions
            .iter()
            .map(|s| s.user_id.clone())
            .chain(graders.iter().map(|g| g.user_id.clone()))
            .chain(authors.iter().map(|a| a.user_id.clone()))
            .collect();

        let users: HashMap<String, User> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            UserEntity::find()
                .filter(UserColumn::Id.is_in(user_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|user| (user.id.clone(), user))
                .collect()
        };

        Ok(ThesisChildren {
            supervisions,
            graders,
            authors,
            attachments,
            users,
        })
    }

    /// Response objects for theses, in the given order
    pub async fn thesis_data(&self, theses: &[Thesis]) -> Result<Vec<ThesisData>> {
        let children = Self::load_children(self.read_conn(), theses).await?;
        Ok(children.assemble(theses))
    }

    // ========================================================================
    // Thesis Writes (transaction scoped)
    // ========================================================================

    pub async fn insert_thesis<C: ConnectionTrait>(conn: &C, fields: ThesisFields) -> Result<Thesis> {
        let now = Utc::now();
        let thesis = ThesisActiveModel {
            id: Set(Uuid::new_v4()),
            program_id: Set(fields.program_id),
            study_track_id: Set(fields.study_track_id),
            topic: Set(fields.topic),
            status: Set(fields.status),
            start_date: Set(fields.start_date),
            target_date: Set(fields.target_date),
            created_at: Set(now),
            updated_at: Set(now),
        };

        thesis.insert(conn).await.map_err(Into::into)
    }

    pub async fn update_thesis<C: ConnectionTrait>(
        conn: &C,
        current: Thesis,
        fields: ThesisFields,
    ) -> Result<Thesis> {
        let mut active: ThesisActiveModel = current.into();
        active.program_id = Set(fields.program_id);
        active.study_track_id = Set(fields.study_track_id);
        active.topic = Set(fields.topic);
        active.status = Set(fields.status);
        active.start_date = Set(fields.start_date);
        active.target_date = Set(fields.target_date);
        active.updated_at = Set(Utc::now());

        active.update(conn).await.map_err(Into::into)
    }

    /// Apply a supervision plan: deletes first, then updates, then inserts
    pub async fn apply_supervision_plan<C: ConnectionTrait>(
        conn: &C,
        thesis_id: Uuid,
        plan: &SupervisionPlan,
    ) -> Result<()> {
        if !plan.to_delete.is_empty() {
            SupervisionEntity::delete_many()
                .filter(SupervisionColumn::ThesisId.eq(thesis_id))
                .filter(SupervisionColumn::UserId.is_in(plan.to_delete.iter().cloned()))
                .exec(conn)
                .await?;
        }

        for row in &plan.to_update {
            SupervisionActiveModel {
                thesis_id: Set(thesis_id),
                user_id: Set(row.user_id.clone()),
                percentage: Set(row.percentage),
                is_external: Set(row.is_external),
                is_primary_supervisor: Set(row.is_primary_supervisor),
            }
            .update(conn)
            .await?;
        }

        if !plan.to_create.is_empty() {
            let rows = plan.to_create.iter().map(|row| SupervisionActiveModel {
                thesis_id: Set(thesis_id),
                user_id: Set(row.user_id.clone()),
                percentage: Set(row.percentage),
                is_external: Set(row.is_external),
                is_primary_supervisor: Set(row.is_primary_supervisor),
            });
            SupervisionEntity::insert_many(rows).exec_without_returning(conn).await?;
        }

        Ok(())
    }

    /// Replace the grader set of a thesis
    pub async fn apply_grader_plan<C: ConnectionTrait>(
        conn: &C,
        thesis_id: Uuid,
        plan: &GraderPlan,
    ) -> Result<()> {
        GraderEntity::delete_many()
            .filter(GraderColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;

        if !plan.rows.is_empty() {
            let rows = plan.rows.iter().map(|row| GraderActiveModel {
                thesis_id: Set(thesis_id),
                user_id: Set(row.user_id.clone()),
                is_primary_grader: Set(row.is_primary_grader),
                is_external: Set(row.is_external),
            });
            GraderEntity::insert_many(rows).exec_without_returning(conn).await?;
        }

        Ok(())
    }

    /// Replace the author set of a thesis
    pub async fn replace_authors<C: ConnectionTrait>(
        conn: &C,
        thesis_id: Uuid,
        user_ids: &[String],
    ) -> Result<()> {
        AuthorEntity::delete_many()
            .filter(AuthorColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;

        if !user_ids.is_empty() {
            let rows = user_ids.iter().map(|user_id| AuthorActiveModel {
                thesis_id: Set(thesis_id),
                user_id: Set(user_id.clone()),
            });
            AuthorEntity::insert_many(rows).exec_without_returning(conn).await?;
        }

        Ok(())
    }

    /// Drop superseded attachment rows and record the newly stored files
    pub async fn replace_attachments<C: ConnectionTrait>(
        conn: &C,
        thesis_id: Uuid,
        superseded: &[Attachment],
        stored: &[StoredAttachment],
    ) -> Result<()> {
        if !superseded.is_empty() {
            AttachmentEntity::delete_many()
                .filter(AttachmentColumn::Id.is_in(superseded.iter().map(|a| a.id)))
                .exec(conn)
                .await?;
        }

        if !stored.is_empty() {
            let rows = stored.iter().map(|file| AttachmentActiveModel {
                id: Set(Uuid::new_v4()),
                thesis_id: Set(thesis_id),
                label: Set(file.label),
                filename: Set(file.filename.clone()),
                mimetype: Set(file.mimetype.clone()),
                originalname: Set(file.original_name.clone()),
            });
            AttachmentEntity::insert_many(rows).exec_without_returning(conn).await?;
        }

        Ok(())
    }

    /// Delete a thesis with all of its children. Returns the attachment rows
    /// that were removed so the caller can delete their files.
    pub async fn delete_thesis<C: ConnectionTrait>(conn: &C, thesis_id: Uuid) -> Result<Vec<Attachment>> {
        let attachments = Self::attachments_of(conn, &[thesis_id]).await?;

        SupervisionEntity::delete_many()
            .filter(SupervisionColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;
        GraderEntity::delete_many()
            .filter(GraderColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;
        AuthorEntity::delete_many()
            .filter(AuthorColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;
        AttachmentEntity::delete_many()
            .filter(AttachmentColumn::ThesisId.eq(thesis_id))
            .exec(conn)
            .await?;
        ThesisEntity::delete_by_id(thesis_id).exec(conn).await?;

        Ok(attachments)
    }
}
