//! Attachment entity: metadata of a stored thesis document

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The two document slots a thesis has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "camelCase")]
pub enum AttachmentLabel {
    #[sea_orm(string_value = "researchPlan")]
    ResearchPlan,
    #[sea_orm(string_value = "waysOfWorking")]
    WaysOfWorking,
}

impl AttachmentLabel {
    pub const ALL: [AttachmentLabel; 2] = [AttachmentLabel::ResearchPlan, AttachmentLabel::WaysOfWorking];

    /// Multipart field name and JSON key for this label
    pub fn field_name(&self) -> &'static str {
        match self {
            AttachmentLabel::ResearchPlan => "researchPlan",
            AttachmentLabel::WaysOfWorking => "waysOfWorking",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.field_name() == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub thesis_id: Uuid,

    /// Unique per thesis, see `db::schema`
    pub label: AttachmentLabel,

    /// Name of the file in the file store
    #[sea_orm(column_type = "Text", unique)]
    pub filename: String,

    #[sea_orm(column_type = "Text")]
    pub mimetype: String,

    #[sea_orm(column_type = "Text")]
    pub originalname: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::thesis::Entity",
        from = "Column::ThesisId",
        to = "super::thesis::Column::Id",
        on_delete = "Cascade"
    )]
    Thesis,
}

impl Related<super::thesis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Thesis.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
