//! Teacher entity (the authenticated principal)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teacher")]
pub struct Model {
    /// Login username
    #[sea_orm(primary_key, auto_increment = false)]
    pub teacher_id: String,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    /// Argon2 PHC string
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub full_name: String,

    pub phone: String,

    pub year_of_birth: Option<i32>,

    pub academic_title: String,

    pub major: String,

    /// `M`, `F` or `O`
    pub gender: String,

    pub number_of_current_class: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Human readable gender label
    pub fn gender_display(&self) -> &'static str {
        match self.gender.as_str() {
            "M" => "Nam",
            "F" => "Nữ",
            _ => "Khác",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::university_class::Entity")]
    Classes,
}

impl Related<super::university_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Classes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
