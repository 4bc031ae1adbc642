//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use sea_orm::JoinType;

/// Outcome of writing one roster row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterUpsert {
    Created,
    Updated,
}

/// Roster fields written for a student on upload or import
#[derive(Debug, Clone, PartialEq)]
pub struct StudentFields {
    pub student_name: String,
    pub student_gmail: String,
    pub passed_credit: i32,
    pub score_10: f64,
    pub score_4: f64,
    pub score_char: String,
    pub rank: String,
}

/// Fields for a newly registered teacher
#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub teacher_id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub year_of_birth: Option<i32>,
    pub academic_title: Option<String>,
    pub major: Option<String>,
    pub gender: Option<String>,
}

/// Fields for a new class
#[derive(Debug, Clone)]
pub struct NewClass {
    pub class_name: String,
    pub number_of_student: i32,
    pub class_major: String,
    pub teacher_note: String,
    pub total_credit: i32,
    pub total_semester: i32,
}

/// Partial class update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ClassChanges {
    pub number_of_student: Option<i32>,
    pub class_major: Option<String>,
    pub teacher_note: Option<String>,
    pub total_credit: Option<i32>,
    pub total_semester: Option<i32>,
    pub is_active: Option<bool>,
    pub status: Option<ClassStatus>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Teacher Operations
    // ========================================================================

    /// Find teacher by login username
    pub async fn find_teacher(&self, teacher_id: &str) -> Result<Option<Teacher>> {
        TeacherEntity::find_by_id(teacher_id.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find teacher by email
    pub async fn find_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>> {
        TeacherEntity::find()
            .filter(TeacherColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Register a teacher, rejecting a taken username or email
    pub async fn create_teacher(&self, new: NewTeacher) -> Result<Teacher> {
        if self.find_teacher(&new.teacher_id).await?.is_some() {
            return Err(AppError::DuplicateAccount {
                message: format!("username {} is taken", new.teacher_id),
            });
        }
        if self.find_teacher_by_email(&new.email).await?.is_some() {
            return Err(AppError::DuplicateAccount {
                message: format!("email {} is already registered", new.email),
            });
        }

        let now = Utc::now();
        let teacher = TeacherActiveModel {
            teacher_id: Set(new.teacher_id),
            email: Set(new.email),
            password_hash: Set(new.password_hash),
            full_name: Set(new.full_name),
            phone: Set(new.phone),
            year_of_birth: Set(None),
            academic_title: Set(String::new()),
            major: Set(String::new()),
            gender: Set("O".to_string()),
            number_of_current_class: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        teacher.insert(self.conn()).await.map_err(Into::into)
    }

    /// Apply a partial profile update
    pub async fn update_teacher_profile(
        &self,
        teacher_id: &str,
        changes: ProfileChanges,
    ) -> Result<Teacher> {
        let existing = self
            .find_teacher(teacher_id)
            .await?
            .ok_or_else(|| AppError::TeacherNotFound { teacher_id: teacher_id.to_string() })?;

        if let Some(ref email) = changes.email {
            if email != &existing.email && self.find_teacher_by_email(email).await?.is_some() {
                return Err(AppError::DuplicateAccount {
                    message: format!("email {} is already registered", email),
                });
            }
        }

        let mut teacher: TeacherActiveModel = existing.into();
        if let Some(email) = changes.email {
            teacher.email = Set(email);
        }
        if let Some(full_name) = changes.full_name {
            teacher.full_name = Set(full_name);
        }
        if let Some(phone) = changes.phone {
            teacher.phone = Set(phone);
        }
        if let Some(year) = changes.year_of_birth {
            teacher.year_of_birth = Set(Some(year));
        }
        if let Some(title) = changes.academic_title {
            teacher.academic_title = Set(title);
        }
        if let Some(major) = changes.major {
            teacher.major = Set(major);
        }
        if let Some(gender) = changes.gender {
            teacher.gender = Set(gender);
        }
        teacher.updated_at = Set(Utc::now().into());

        teacher.update(self.conn()).await.map_err(Into::into)
    }

    /// Shift the teacher's current class counter, never below zero
    pub async fn adjust_class_count(&self, teacher_id: &str, delta: i32) -> Result<()> {
        let Some(existing) = self.find_teacher(teacher_id).await? else {
            return Ok(());
        };

        let count = (existing.number_of_current_class + delta).max(0);
        let mut teacher: TeacherActiveModel = existing.into();
        teacher.number_of_current_class = Set(count);
        teacher.update(self.conn()).await?;
        Ok(())
    }

    // ========================================================================
    // Token Revocation
    // ========================================================================

    /// Revoke a refresh token by its ID
    pub async fn revoke_token(
        &self,
        jti: &str,
        teacher_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let revoked = RevokedTokenActiveModel {
            jti: Set(jti.to_string()),
            teacher_id: Set(teacher_id.to_string()),
            expires_at: Set(expires_at.into()),
        };

        RevokedTokenEntity::insert(revoked)
            .on_conflict(OnConflict::column(RevokedTokenColumn::Jti).do_nothing().to_owned())
            .exec_without_returning(self.conn())
            .await?;
        Ok(())
    }

    /// Check whether a refresh token was revoked
    pub async fn is_token_revoked(&self, jti: &str) -> Result<bool> {
        let found = RevokedTokenEntity::find_by_id(jti.to_string())
            .one(self.conn())
            .await?;
        Ok(found.is_some())
    }

    // ========================================================================
    // Class Operations
    // ========================================================================

    /// List classes owned by a teacher
    pub async fn list_classes(&self, teacher_id: &str) -> Result<Vec<UniversityClass>> {
        ClassEntity::find()
            .filter(ClassColumn::TeacherId.eq(teacher_id))
            .order_by_asc(ClassColumn::ClassName)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find class by name
    pub async fn find_class(&self, class_name: &str) -> Result<Option<UniversityClass>> {
        ClassEntity::find_by_id(class_name.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create a class owned by the teacher
    pub async fn create_class(&self, teacher_id: &str, new: NewClass) -> Result<UniversityClass> {
        if self.find_class(&new.class_name).await?.is_some() {
            return Err(AppError::DuplicateClass { class_name: new.class_name });
        }

        let class = ClassActiveModel {
            class_name: Set(new.class_name),
            teacher_id: Set(teacher_id.to_string()),
            number_of_student: Set(new.number_of_student),
            class_major: Set(new.class_major),
            teacher_note: Set(new.teacher_note),
            total_credit: Set(new.total_credit),
            is_active: Set(true),
            status: Set(ClassStatus::Active.as_str().to_string()),
            total_semester: Set(new.total_semester),
        };

        let created = class.insert(self.conn()).await?;
        self.adjust_class_count(teacher_id, 1).await?;
        Ok(created)
    }

    /// Apply a partial class update
    pub async fn update_class(
        &self,
        existing: UniversityClass,
        changes: ClassChanges,
    ) -> Result<UniversityClass> {
        let mut class: ClassActiveModel = existing.into();
        if let Some(n) = changes.number_of_student {
            class.number_of_student = Set(n);
        }
        if let Some(major) = changes.class_major {
            class.class_major = Set(major);
        }
        if let Some(note) = changes.teacher_note {
            class.teacher_note = Set(note);
        }
        if let Some(credit) = changes.total_credit {
            class.total_credit = Set(credit);
        }
        if let Some(semesters) = changes.total_semester {
            class.total_semester = Set(semesters);
        }
        if let Some(active) = changes.is_active {
            class.is_active = Set(active);
        }
        if let Some(status) = changes.status {
            class.status = Set(status.as_str().to_string());
        }

        class.update(self.conn()).await.map_err(Into::into)
    }

    /// Delete a class (students and offerings cascade)
    pub async fn delete_class(&self, class: &UniversityClass) -> Result<bool> {
        let result = ClassEntity::delete_by_id(class.class_name.clone())
            .exec(self.conn())
            .await?;

        if result.rows_affected > 0 {
            self.adjust_class_count(&class.teacher_id, -1).await?;
        }
        Ok(result.rows_affected > 0)
    }

    /// Recount a class's students and store the number
    pub async fn refresh_student_count(&self, class_name: &str) -> Result<u64> {
        let count = StudentEntity::find()
            .filter(StudentColumn::ClassName.eq(class_name))
            .count(self.conn())
            .await?;

        if let Some(existing) = self.find_class(class_name).await? {
            let mut class: ClassActiveModel = existing.into();
            class.number_of_student = Set(count as i32);
            class.update(self.conn()).await?;
        }
        Ok(count)
    }

    // ========================================================================
    // Student Operations
    // ========================================================================

    /// List a class's students
    pub async fn list_students(&self, class_name: &str) -> Result<Vec<Student>> {
        StudentEntity::find()
            .filter(StudentColumn::ClassName.eq(class_name))
            .order_by_asc(StudentColumn::StudentId)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find student by ID
    pub async fn find_student(&self, student_id: &str) -> Result<Option<Student>> {
        StudentEntity::find_by_id(student_id.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create the student, or overwrite its roster fields and move it to this class
    pub async fn upsert_student(
        &self,
        class_name: &str,
        student_id: &str,
        fields: StudentFields,
    ) -> Result<RosterUpsert> {
        match self.find_student(student_id).await? {
            Some(existing) => {
                let mut student: StudentActiveModel = existing.into();
                student.class_name = Set(class_name.to_string());
                student.student_name = Set(fields.student_name);
                student.student_gmail = Set(fields.student_gmail);
                student.passed_credit = Set(fields.passed_credit);
                student.score_10 = Set(fields.score_10);
                student.score_4 = Set(fields.score_4);
                student.score_char = Set(fields.score_char);
                student.rank = Set(fields.rank);
                student.update(self.conn()).await?;
                Ok(RosterUpsert::Updated)
            }
            None => {
                self.insert_student(class_name, student_id, fields).await?;
                Ok(RosterUpsert::Created)
            }
        }
    }

    /// Create the student only if the ID is unused; returns whether it was created
    pub async fn create_student_if_absent(
        &self,
        class_name: &str,
        student_id: &str,
        fields: StudentFields,
    ) -> Result<bool> {
        if self.find_student(student_id).await?.is_some() {
            return Ok(false);
        }
        self.insert_student(class_name, student_id, fields).await?;
        Ok(true)
    }

    async fn insert_student(
        &self,
        class_name: &str,
        student_id: &str,
        fields: StudentFields,
    ) -> Result<Student> {
        let student = StudentActiveModel {
            student_id: Set(student_id.to_string()),
            class_name: Set(class_name.to_string()),
            student_name: Set(fields.student_name),
            student_gmail: Set(fields.student_gmail),
            passed_credit: Set(fields.passed_credit),
            score_10: Set(fields.score_10),
            score_4: Set(fields.score_4),
            score_char: Set(fields.score_char),
            is_graduated: Set(false),
            rank: Set(fields.rank),
        };

        student.insert(self.conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Subject Catalog Operations
    // ========================================================================

    /// All subjects, in code order
    pub async fn list_subjects(&self) -> Result<Vec<Subject>> {
        SubjectEntity::find()
            .order_by_asc(SubjectColumn::SubjectId)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Size of the subject catalog
    pub async fn count_subjects(&self) -> Result<u64> {
        SubjectEntity::find().count(self.conn()).await.map_err(Into::into)
    }

    /// Find subject by code
    pub async fn find_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
        SubjectEntity::find_by_id(subject_id.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Subjects offered in a class, in code order
    pub async fn list_class_subjects(&self, class_name: &str) -> Result<Vec<Subject>> {
        SubjectEntity::find()
            .join(JoinType::InnerJoin, subject::Relation::Offerings.def())
            .filter(SubjectOfferingColumn::ClassName.eq(class_name))
            .order_by_asc(SubjectColumn::SubjectId)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Get or create a catalog subject; returns whether it was created
    pub async fn get_or_create_subject(
        &self,
        subject_id: &str,
        subject_name: &str,
        credit: i32,
    ) -> Result<(Subject, bool)> {
        if let Some(existing) = self.find_subject(subject_id).await? {
            return Ok((existing, false));
        }

        let subject = SubjectActiveModel {
            subject_id: Set(subject_id.to_string()),
            subject_name: Set(subject_name.trim().to_string()),
            credit: Set(credit),
        };
        let created = subject.insert(self.conn()).await?;
        Ok((created, true))
    }

    /// Get or create a class offering; returns whether it was created
    pub async fn get_or_create_offering(
        &self,
        class_name: &str,
        subject_id: &str,
        semester_id: i32,
    ) -> Result<bool> {
        let key = (class_name.to_string(), subject_id.to_string());
        if SubjectOfferingEntity::find_by_id(key).one(self.conn()).await?.is_some() {
            return Ok(false);
        }

        let offering = SubjectOfferingActiveModel {
            class_name: Set(class_name.to_string()),
            subject_id: Set(subject_id.to_string()),
            semester_id: Set(semester_id),
        };
        offering.insert(self.conn()).await?;
        Ok(true)
    }

    // ========================================================================
    // Score Operations
    // ========================================================================

    /// Student IDs currently in a class
    pub async fn class_student_ids(&self, class_name: &str) -> Result<Vec<String>> {
        let students = StudentEntity::find()
            .filter(StudentColumn::ClassName.eq(class_name))
            .all(self.conn())
            .await?;
        Ok(students.into_iter().map(|s| s.student_id).collect())
    }

    /// Whether a (student, subject) score already exists
    pub async fn score_exists(&self, student_id: &str, subject_id: &str) -> Result<bool> {
        let key = (student_id.to_string(), subject_id.to_string());
        let found = SubjectScoreEntity::find_by_id(key).one(self.conn()).await?;
        Ok(found.is_some())
    }

    /// Insert scores in one statement, ignoring pairs that already exist
    pub async fn insert_scores(&self, scores: Vec<SubjectScore>) -> Result<u64> {
        if scores.is_empty() {
            return Ok(0);
        }

        let models = scores.into_iter().map(|s| SubjectScoreActiveModel {
            student_id: Set(s.student_id),
            subject_id: Set(s.subject_id),
            score_10: Set(s.score_10),
        });

        let inserted = SubjectScoreEntity::insert_many(models)
            .on_conflict(
                OnConflict::columns([SubjectScoreColumn::StudentId, SubjectScoreColumn::SubjectId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn())
            .await?;

        Ok(inserted)
    }
}
