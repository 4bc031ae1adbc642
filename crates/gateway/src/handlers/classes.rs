//! Class management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use vis4t_common::{
    auth::AuthContext,
    db::{
        models::{ClassStatus, Student, UniversityClass},
        ClassChanges, NewClass, Repository,
    },
    errors::{AppError, Result},
};

/// Request to create a class
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 50))]
    pub class_name: String,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub number_of_student: i32,

    #[validate(length(min = 1, max = 100))]
    pub class_major: String,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub teacher_note: String,

    #[validate(range(min = 0, max = 500))]
    pub total_credit: i32,

    #[validate(range(min = 1, max = 20))]
    pub total_semester: i32,
}

/// Partial class update
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateClassRequest {
    #[validate(range(min = 0))]
    pub number_of_student: Option<i32>,

    #[validate(length(min = 1, max = 100))]
    pub class_major: Option<String>,

    #[validate(length(max = 2000))]
    pub teacher_note: Option<String>,

    #[validate(range(min = 0, max = 500))]
    pub total_credit: Option<i32>,

    #[validate(range(min = 1, max = 20))]
    pub total_semester: Option<i32>,

    pub is_active: Option<bool>,

    pub status: Option<ClassStatus>,
}

#[derive(Debug, Serialize)]
pub struct ClassResponse {
    pub class_name: String,
    pub teacher_id: String,
    pub number_of_student: i32,
    pub class_major: String,
    pub teacher_note: String,
    pub total_credit: i32,
    pub is_active: bool,
    pub status: &'static str,
    pub status_display: &'static str,
    pub total_semester: i32,
}

impl From<UniversityClass> for ClassResponse {
    fn from(class: UniversityClass) -> Self {
        let status = class.class_status();
        Self {
            class_name: class.class_name,
            teacher_id: class.teacher_id,
            number_of_student: class.number_of_student,
            class_major: class.class_major,
            teacher_note: class.teacher_note,
            total_credit: class.total_credit,
            is_active: class.is_active,
            status: status.as_str(),
            status_display: status.display(),
            total_semester: class.total_semester,
        }
    }
}

/// Look up a class and require the caller to own it
pub async fn owned_class(
    repo: &Repository,
    auth: &AuthContext,
    class_name: &str,
) -> Result<UniversityClass> {
    let class = repo
        .find_class(class_name)
        .await?
        .ok_or_else(|| AppError::ClassNotFound {
            class_name: class_name.to_string(),
        })?;

    auth.require_owner(&class.teacher_id, &class.class_name)?;
    Ok(class)
}

/// List the caller's classes
pub async fn list_classes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<ClassResponse>>> {
    let repo = Repository::new(state.db.clone());
    let classes = repo.list_classes(&auth.teacher_id).await?;

    Ok(Json(classes.into_iter().map(ClassResponse::from).collect()))
}

/// Create a class owned by the caller
pub async fn create_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassResponse>)> {
    request.validate()?;

    let class_name = request.class_name.trim();
    if class_name.contains('/') || class_name.chars().any(char::is_whitespace) {
        return Err(AppError::Validation {
            message: "class name must not contain '/' or whitespace".to_string(),
            field: Some("class_name".to_string()),
        });
    }

    let repo = Repository::new(state.db.clone());
    let class = repo
        .create_class(
            &auth.teacher_id,
            NewClass {
                class_name: class_name.to_string(),
                number_of_student: request.number_of_student,
                class_major: request.class_major.trim().to_string(),
                teacher_note: request.teacher_note,
                total_credit: request.total_credit,
                total_semester: request.total_semester,
            },
        )
        .await?;

    tracing::info!(
        class_name = %class.class_name,
        teacher_id = %auth.teacher_id,
        request_id = %auth.request_id,
        "Class created"
    );

    Ok((StatusCode::CREATED, Json(class.into())))
}

/// Get a class by name
pub async fn get_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
) -> Result<Json<ClassResponse>> {
    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, &auth, &class_name).await?;

    Ok(Json(class.into()))
}

/// Update a class
pub async fn update_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
    Json(request): Json<UpdateClassRequest>,
) -> Result<Json<ClassResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, &auth, &class_name).await?;

    let changes = ClassChanges {
        number_of_student: request.number_of_student,
        class_major: request.class_major.map(|m| m.trim().to_string()),
        teacher_note: request.teacher_note,
        total_credit: request.total_credit,
        total_semester: request.total_semester,
        is_active: request.is_active,
        status: request.status,
    };
    let class = repo.update_class(class, changes).await?;

    tracing::info!(class_name = %class.class_name, teacher_id = %auth.teacher_id, "Class updated");

    Ok(Json(class.into()))
}

/// Delete a class together with its students and offerings
pub async fn delete_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, &auth, &class_name).await?;

    repo.delete_class(&class).await?;

    tracing::info!(class_name = %class.class_name, teacher_id = %auth.teacher_id, "Class deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// List a class's students
pub async fn list_students(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
) -> Result<Json<Vec<Student>>> {
    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, &auth, &class_name).await?;

    let students = repo.list_students(&class.class_name).await?;
    Ok(Json(students))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_class_validation() {
        let request: CreateClassRequest = serde_json::from_str(
            r#"{"class_name": "KHDL16A", "class_major": "Khoa Học Dữ Liệu", "total_credit": 156, "total_semester": 9}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.number_of_student, 0);

        let request: CreateClassRequest = serde_json::from_str(
            r#"{"class_name": "", "class_major": "KHMT", "total_credit": -1, "total_semester": 0}"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("class_name"));
        assert!(fields.contains_key("total_credit"));
        assert!(fields.contains_key("total_semester"));
    }

    #[test]
    fn test_update_class_status() {
        let request: UpdateClassRequest =
            serde_json::from_str(r#"{"status": "completed", "is_active": false}"#).unwrap();
        assert_eq!(request.status, Some(ClassStatus::Completed));
        assert!(serde_json::from_str::<UpdateClassRequest>(r#"{"status": "archived"}"#).is_err());
    }

    #[test]
    fn test_class_response_labels() {
        let class = UniversityClass {
            class_name: "KHMT14A".to_string(),
            teacher_id: "test".to_string(),
            number_of_student: 72,
            class_major: "Khoa Học Máy Tính".to_string(),
            teacher_note: String::new(),
            total_credit: 128,
            is_active: false,
            status: "suspended".to_string(),
            total_semester: 8,
        };

        let response = ClassResponse::from(class);
        assert_eq!(response.status, "suspended");
        assert_eq!(response.status_display, "Tạm dừng");
    }
}
