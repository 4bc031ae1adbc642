//! University class entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    Active,
    Completed,
    Suspended,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Active => "active",
            ClassStatus::Completed => "completed",
            ClassStatus::Suspended => "suspended",
        }
    }

    /// Label shown in the teacher UI
    pub fn display(&self) -> &'static str {
        match self {
            ClassStatus::Active => "Đang học",
            ClassStatus::Completed => "Hoàn thành",
            ClassStatus::Suspended => "Tạm dừng",
        }
    }
}

impl From<&str> for ClassStatus {
    fn from(s: &str) -> Self {
        match s {
            "completed" => ClassStatus::Completed,
            "suspended" => ClassStatus::Suspended,
            _ => ClassStatus::Active,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "university_class")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub class_name: String,

    pub teacher_id: String,

    pub number_of_student: i32,

    pub class_major: String,

    #[sea_orm(column_type = "Text")]
    pub teacher_note: String,

    pub total_credit: i32,

    pub is_active: bool,

    pub status: String,

    pub total_semester: i32,
}

impl Model {
    /// Get the class status as an enum
    pub fn class_status(&self) -> ClassStatus {
        ClassStatus::from(self.status.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::TeacherId",
        on_delete = "Cascade"
    )]
    Teacher,

    #[sea_orm(has_many = "super::student::Entity")]
    Students,

    #[sea_orm(has_many = "super::subject_class::Entity")]
    Offerings,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl Related<super::subject_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offerings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
