//! Liveness and readiness checks

use axum::{extract::State, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;
use vis4t_common::db::Repository;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub database: DatabaseCheck,
    /// Whether dashboard links can be signed
    pub dashboard: bool,
}

#[derive(Debug, Serialize)]
pub struct DatabaseCheck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Subjects available to score reconciliation; zero means the catalog was never seeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseCheck {
    fn down(error: String) -> Self {
        Self {
            status: "down",
            latency_ms: None,
            subjects: None,
            error: Some(error),
        }
    }
}

/// Liveness check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: vis4t_common::VERSION,
    })
}

/// Readiness: the API is ready once the database answers
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = Instant::now();

    let database = match state.db.ping().await {
        Ok(()) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            match Repository::new(state.db.clone()).count_subjects().await {
                Ok(subjects) => DatabaseCheck {
                    status: "up",
                    latency_ms: Some(latency_ms),
                    subjects: Some(subjects),
                    error: None,
                },
                Err(e) => DatabaseCheck::down(e.to_string()),
            }
        }
        Err(e) => DatabaseCheck::down(e.to_string()),
    };

    if database.subjects == Some(0) {
        tracing::warn!("Subject catalog is empty; run vis4t-ingest seed-subjects");
    }

    Json(ReadyResponse {
        status: if database.status == "up" { "ready" } else { "not_ready" },
        checks: ReadyChecks {
            database,
            dashboard: state.dashboard.is_some(),
        },
    })
}
