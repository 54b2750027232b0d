//! User entity
//!
//! Internal users are synced from the directory and upserted from SSO headers.
//! External persons (supervisors/graders without an account) are created on
//! demand with `is_external` set and no login.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text", unique)]
    pub username: String,

    #[sea_orm(column_type = "Text")]
    pub first_name: String,

    #[sea_orm(column_type = "Text")]
    pub last_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub language: String,

    pub is_admin: bool,

    pub is_external: bool,

    /// Directory group memberships as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub iam_groups: Json,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub favorite_program_ids: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub department_id: Option<String>,

    /// Saved column filters of the theses table
    #[sea_orm(column_type = "JsonBinary")]
    pub theses_table_filters: Json,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::supervision::Entity")]
    Supervisions,

    #[sea_orm(has_many = "super::program_management::Entity")]
    ProgramManagements,
}

impl Related<super::supervision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supervisions.def()
    }
}

impl Related<super::program_management::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProgramManagements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Group memberships as plain strings, ignoring malformed entries
    pub fn groups(&self) -> Vec<String> {
        self.iam_groups
            .as_array()
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| g.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
