//! Teacher profile handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::AppState;
use vis4t_common::{
    auth::AuthContext,
    db::{models::Teacher, ProfileChanges, Repository},
    errors::{AppError, Result},
};

/// Public view of a teacher account
#[derive(Debug, Serialize)]
pub struct TeacherProfile {
    pub teacher_id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub year_of_birth: Option<i32>,
    pub academic_title: String,
    pub major: String,
    pub gender: String,
    pub gender_display: &'static str,
    pub number_of_current_class: i32,
}

impl From<Teacher> for TeacherProfile {
    fn from(teacher: Teacher) -> Self {
        let gender_display = teacher.gender_display();
        Self {
            username: teacher.teacher_id.clone(),
            teacher_id: teacher.teacher_id,
            email: teacher.email,
            full_name: teacher.full_name,
            phone: teacher.phone,
            year_of_birth: teacher.year_of_birth,
            academic_title: teacher.academic_title,
            major: teacher.major,
            gender: teacher.gender,
            gender_display,
            number_of_current_class: teacher.number_of_current_class,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(range(min = 1900, max = 2100))]
    pub year_of_birth: Option<i32>,

    #[validate(length(max = 50))]
    pub academic_title: Option<String>,

    #[validate(length(max = 100))]
    pub major: Option<String>,

    #[validate(custom(function = "validate_gender"))]
    pub gender: Option<String>,
}

fn validate_gender(gender: &str) -> std::result::Result<(), ValidationError> {
    match gender {
        "M" | "F" | "O" => Ok(()),
        _ => Err(ValidationError::new("gender must be one of M, F, O")),
    }
}

/// Get the authenticated teacher's profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<TeacherProfile>> {
    let repo = Repository::new(state.db.clone());

    let teacher = repo
        .find_teacher(&auth.teacher_id)
        .await?
        .ok_or_else(|| AppError::TeacherNotFound {
            teacher_id: auth.teacher_id.clone(),
        })?;

    Ok(Json(teacher.into()))
}

/// Update the authenticated teacher's profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<TeacherProfile>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let changes = ProfileChanges {
        email: request.email.map(|e| e.trim().to_lowercase()),
        full_name: request.full_name.map(|n| n.trim().to_string()),
        phone: request.phone,
        year_of_birth: request.year_of_birth,
        academic_title: request.academic_title,
        major: request.major,
        gender: request.gender,
    };

    let teacher = repo.update_teacher_profile(&auth.teacher_id, changes).await?;

    tracing::info!(
        teacher_id = %auth.teacher_id,
        request_id = %auth.request_id,
        "Profile updated"
    );

    Ok(Json(teacher.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_profile_validation() {
        let request: UpdateProfileRequest =
            serde_json::from_str(r#"{"email": "not-an-email", "gender": "X"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("gender"));

        let request: UpdateProfileRequest =
            serde_json::from_str(r#"{"full_name": "Võ Văn A", "year_of_birth": 1979, "gender": "M"}"#)
                .unwrap();
        assert!(request.validate().is_ok());
    }
}
