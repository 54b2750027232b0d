//! Thesis entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a thesis.
///
/// Transitions are not linear; who may set which status is decided by
/// [`crate::access::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThesisStatus {
    #[sea_orm(string_value = "PLANNING")]
    Planning,
    #[sea_orm(string_value = "STARTED")]
    Started,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl ThesisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThesisStatus::Planning => "PLANNING",
            ThesisStatus::Started => "STARTED",
            ThesisStatus::InProgress => "IN_PROGRESS",
            ThesisStatus::Completed => "COMPLETED",
            ThesisStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ThesisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "theses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub program_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub study_track_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub topic: String,

    pub status: ThesisStatus,

    pub start_date: DateTimeUtc,

    pub target_date: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::program::Entity",
        from = "Column::ProgramId",
        to = "super::program::Column::Id"
    )]
    Program,

    #[sea_orm(has_many = "super::supervision::Entity")]
    Supervisions,

    #[sea_orm(has_many = "super::grader::Entity")]
    Graders,

    #[sea_orm(has_many = "super::author::Entity")]
    Authors,

    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachments,
}

impl Related<super::program::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Program.def()
    }
}

impl Related<super::supervision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supervisions.def()
    }
}

impl Related<super::grader::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Graders.def()
    }
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Authors.def()
    }
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
