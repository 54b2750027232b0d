//! Supervision entity: a user's share in supervising a thesis

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supervisions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub thesis_id: Uuid,

    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Share of the supervision, summing to 100 across a thesis
    pub percentage: i32,

    pub is_external: bool,

    pub is_primary_supervisor: bool,
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

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::thesis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Thesis.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
