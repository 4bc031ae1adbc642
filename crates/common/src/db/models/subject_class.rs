//! Subject offering: a subject scheduled in one class and semester

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subject_class")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub class_name: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub subject_id: String,

    pub semester_id: i32,
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

    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::SubjectId",
        on_delete = "Cascade"
    )]
    Subject,
}

impl Related<super::university_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
