//! SeaORM entity models
//!
//! Database entities for Vis4T

pub(crate) mod teacher;
pub(crate) mod university_class;
pub(crate) mod student;
pub(crate) mod subject;
pub(crate) mod subject_class;
pub(crate) mod subject_student;
pub(crate) mod revoked_token;

pub use teacher::{
    Entity as TeacherEntity,
    Model as Teacher,
    ActiveModel as TeacherActiveModel,
    Column as TeacherColumn,
};

pub use university_class::{
    Entity as ClassEntity,
    Model as UniversityClass,
    ActiveModel as ClassActiveModel,
    Column as ClassColumn,
    ClassStatus,
};

pub use student::{
    Entity as StudentEntity,
    Model as Student,
    ActiveModel as StudentActiveModel,
    Column as StudentColumn,
};

pub use subject::{
    Entity as SubjectEntity,
    Model as Subject,
    ActiveModel as SubjectActiveModel,
    Column as SubjectColumn,
};

pub use subject_class::{
    Entity as SubjectOfferingEntity,
    Model as SubjectOffering,
    ActiveModel as SubjectOfferingActiveModel,
    Column as SubjectOfferingColumn,
};

pub use subject_student::{
    Entity as SubjectScoreEntity,
    Model as SubjectScore,
    ActiveModel as SubjectScoreActiveModel,
    Column as SubjectScoreColumn,
};

pub use revoked_token::{
    Entity as RevokedTokenEntity,
    Model as RevokedToken,
    ActiveModel as RevokedTokenActiveModel,
    Column as RevokedTokenColumn,
};
