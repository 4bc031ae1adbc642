//! Subject catalog entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subject")]
pub struct Model {
    /// Stable subject code
    #[sea_orm(primary_key, auto_increment = false)]
    pub subject_id: String,

    pub subject_name: String,

    pub credit: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subject_class::Entity")]
    Offerings,

    #[sea_orm(has_many = "super::subject_student::Entity")]
    Scores,
}

impl Related<super::subject_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offerings.def()
    }
}

impl Related<super::subject_student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scores.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
