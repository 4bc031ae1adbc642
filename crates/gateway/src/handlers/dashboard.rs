//! Embedded analytics dashboard links

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::handlers::classes::owned_class;
use crate::AppState;
use vis4t_common::{
    auth::AuthContext,
    dashboard::DashboardSigner,
    db::Repository,
    errors::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub dashboard_url: String,
}

fn signer(state: &AppState) -> Result<Arc<DashboardSigner>> {
    state
        .dashboard
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable {
            message: "Dashboard embedding is not configured".to_string(),
        })
}

/// Signed dashboard URL for one of the caller's classes
pub async fn class_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
) -> Result<Json<DashboardResponse>> {
    let signer = signer(&state)?;
    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, &auth, &class_name).await?;

    let dashboard_url = signer.class_dashboard_url(&class.class_name)?;
    Ok(Json(DashboardResponse { dashboard_url }))
}

/// Signed dashboard URL for a student in one of the caller's classes
pub async fn student_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(student_id): Path<String>,
) -> Result<Json<DashboardResponse>> {
    let signer = signer(&state)?;
    let repo = Repository::new(state.db.clone());

    let student = repo
        .find_student(&student_id)
        .await?
        .ok_or_else(|| AppError::StudentNotFound {
            student_id: student_id.clone(),
        })?;
    owned_class(&repo, &auth, &student.class_name).await?;

    let dashboard_url = signer.student_dashboard_url(&student.student_id)?;
    Ok(Json(DashboardResponse { dashboard_url }))
}
