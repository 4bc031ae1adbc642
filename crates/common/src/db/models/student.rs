//! Student entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student")]
pub struct Model {
    /// Fixed-width numeric identifier, unique across classes
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: String,

    /// Owning class; re-uploading a roster reassigns it
    pub class_name: String,

    pub student_name: String,

    pub student_gmail: String,

    pub passed_credit: i32,

    pub score_10: f64,

    pub score_4: f64,

    pub score_char: String,

    pub is_graduated: bool,

    pub rank: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::university_class::Entity",
        from = "Column::ClassName",
        to = "super::university_class::Column::ClassName",
        on_delete = "Cascade"
    )]
    Class,

    #[sea_orm(has_many = "super::subject_student::Entity")]
    Scores,
}

impl Related<super::university_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::subject_student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scores.def()
    }
}

/// Students and subjects are linked through their score rows
impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        super::subject_student::Relation::Subject.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::subject_student::Relation::Student.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
