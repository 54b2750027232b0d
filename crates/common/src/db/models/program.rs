//! Program entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "programs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Translated name `{ "fi": .., "en": .., "sv": .. }`
    #[sea_orm(column_type = "JsonBinary")]
    pub name: Json,

    #[sea_orm(column_type = "Text")]
    pub level: String,

    pub international: bool,

    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::study_track::Entity")]
    StudyTracks,

    #[sea_orm(has_many = "super::thesis::Entity")]
    Theses,

    #[sea_orm(has_many = "super::program_management::Entity")]
    Managements,
}

impl Related<super::study_track::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudyTracks.def()
    }
}

impl Related<super::thesis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Theses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
