//! Account handlers: register, login, logout, token refresh

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::profile::TeacherProfile;
use crate::AppState;
use vis4t_common::{
    auth::{hash_password, verify_password, AuthContext, TokenKind, TokenPair},
    db::{NewTeacher, Repository},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub full_name: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[validate(must_match(other = "password"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh: String,
}

/// Returned on register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: TeacherProfile,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// Create a teacher account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    request.validate()?;

    let username = request.username.trim();
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation {
            message: "username must not contain whitespace".to_string(),
            field: Some("username".to_string()),
        });
    }

    let repo = Repository::new(state.db.clone());
    let teacher = repo
        .create_teacher(NewTeacher {
            teacher_id: username.to_string(),
            email: request.email.trim().to_lowercase(),
            password_hash: hash_password(&request.password)?,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone.trim().to_string(),
        })
        .await?;

    let tokens = state.jwt.generate_pair(&teacher.teacher_id)?;

    tracing::info!(teacher_id = %teacher.teacher_id, "Teacher registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: teacher.into(),
            tokens,
        }),
    ))
}

/// Exchange username and password for a token pair
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let teacher = repo
        .find_teacher(request.username.trim())
        .await?
        .filter(|t| verify_password(&request.password, &t.password_hash))
        .ok_or(AppError::InvalidCredentials)?;

    let tokens = state.jwt.generate_pair(&teacher.teacher_id)?;

    tracing::info!(teacher_id = %teacher.teacher_id, "Teacher logged in");

    Ok(Json(AuthResponse {
        user: teacher.into(),
        tokens,
    }))
}

/// Revoke the caller's refresh token
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<RefreshRequest>,
) -> Result<StatusCode> {
    request.validate()?;

    let claims = state.jwt.validate_token(&request.refresh, TokenKind::Refresh)?;
    if claims.sub != auth.teacher_id {
        return Err(AppError::InvalidToken);
    }

    let repo = Repository::new(state.db.clone());
    repo.revoke_token(&claims.jti, &claims.sub, claims.expires_at())
        .await?;

    tracing::info!(teacher_id = %auth.teacher_id, request_id = %auth.request_id, "Teacher logged out");

    Ok(StatusCode::RESET_CONTENT)
}

/// Issue a fresh access token from a valid, unrevoked refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AccessResponse>> {
    request.validate()?;

    let claims = state.jwt.validate_token(&request.refresh, TokenKind::Refresh)?;

    let repo = Repository::new(state.db.clone());
    if repo.is_token_revoked(&claims.jti).await? {
        return Err(AppError::InvalidToken);
    }
    if repo.find_teacher(&claims.sub).await?.is_none() {
        return Err(AppError::InvalidToken);
    }

    let access = state.jwt.generate_token(&claims.sub, TokenKind::Access)?;
    Ok(Json(AccessResponse { access }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_json(password_confirm: &str) -> String {
        format!(
            r#"{{"username": "test", "email": "test@gmail.com", "password": "secret1", "password_confirm": "{}"}}"#,
            password_confirm
        )
    }

    #[test]
    fn test_register_validation() {
        let ok: RegisterRequest = serde_json::from_str(&register_json("secret1")).unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.full_name, "");

        let mismatch: RegisterRequest = serde_json::from_str(&register_json("secret2")).unwrap();
        let errors = mismatch.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn test_short_password_rejected() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username": "test", "email": "test@gmail.com", "password": "abc", "password_confirm": "abc"}"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }
}
