//! Roster upload handler
//!
//! The uploaded spreadsheet is staged in a temp file under the configured
//! upload directory, parsed off the async runtime, and each roster row is
//! upserted into the class. Row-level write failures are reported back
//! instead of failing the whole upload.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

use crate::handlers::classes::owned_class;
use crate::AppState;
use vis4t_common::{
    auth::AuthContext,
    config::IngestionConfig,
    db::{Repository, RosterUpsert},
    errors::{AppError, Result},
    metrics,
};
use vis4t_ingestion::{loader::SourceFormat, read_roster, IngestionError, RosterRow};

#[derive(Debug, Default, Serialize)]
pub struct UploadResponse {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

/// An uploaded file held in memory
struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

/// Upload a class roster (`.xlsx` or `.csv`)
pub async fn upload_students(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(class_name): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();
    let result = process_upload(&state, &auth, &class_name, multipart).await;

    let duration = start.elapsed().as_secs_f64();
    match &result {
        Ok(response) => {
            metrics::record_upload(duration, response.created, response.updated, response.errors.len(), true);
            tracing::info!(
                class_name = %class_name,
                teacher_id = %auth.teacher_id,
                request_id = %auth.request_id,
                total = response.total,
                created = response.created,
                updated = response.updated,
                failed = response.errors.len(),
                "Roster uploaded"
            );
        }
        Err(e) => {
            metrics::record_upload(duration, 0, 0, 0, false);
            tracing::warn!(class_name = %class_name, error = %e, "Roster upload rejected");
        }
    }

    result.map(Json)
}

async fn process_upload(
    state: &AppState,
    auth: &AuthContext,
    class_name: &str,
    multipart: Multipart,
) -> Result<UploadResponse> {
    let repo = Repository::new(state.db.clone());
    let class = owned_class(&repo, auth, class_name).await?;

    let upload = read_file_field(multipart, state.config.server.max_upload_bytes).await?;
    let format = SourceFormat::from_path(std::path::Path::new(&upload.file_name))?;

    let rows = parse_roster(upload.bytes, format, state).await?;
    if rows.is_empty() {
        return Err(AppError::EmptyUpload);
    }

    let width = state.config.ingestion.student_id_width;
    let mut response = UploadResponse {
        total: rows.len(),
        ..UploadResponse::default()
    };

    for (index, row) in rows.iter().enumerate() {
        let student_id = row.padded_id(width);
        match repo
            .upsert_student(&class.class_name, &student_id, row.to_fields())
            .await
        {
            Ok(RosterUpsert::Created) => response.created += 1,
            Ok(RosterUpsert::Updated) => response.updated += 1,
            Err(e) => {
                tracing::warn!(class_name = %class.class_name, student_id = %student_id, error = %e, "Roster row not saved");
                response
                    .errors
                    .push(format!("Row {} (student {}): {}", index + 1, student_id, e));
            }
        }
    }

    repo.refresh_student_count(&class.class_name).await?;
    Ok(response)
}

/// Take the `file` field from the multipart body
async fn read_file_field(mut multipart: Multipart, limit: usize) -> Result<UploadedFile> {
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::MissingField {
                field: "file".to_string(),
            })?;
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        if bytes.is_empty() {
            return Err(AppError::EmptyUpload);
        }
        if bytes.len() > limit {
            return Err(AppError::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }

        return Ok(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::MissingField {
        field: "file".to_string(),
    })
}

fn multipart_error(e: axum::extract::multipart::MultipartError, limit: usize) -> AppError {
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { size: limit + 1, limit }
    } else {
        AppError::InvalidFormat {
            message: e.body_text(),
        }
    }
}

/// Stage the bytes in a temp file and parse them on the blocking pool.
/// The temp file is removed when the task finishes, whatever the outcome.
async fn parse_roster(
    bytes: Vec<u8>,
    format: SourceFormat,
    state: &AppState,
) -> Result<Vec<RosterRow>> {
    let upload_dir = state.config.server.upload_dir.clone();
    let config: IngestionConfig = state.config.ingestion.clone();

    let rows = tokio::task::spawn_blocking(move || -> std::result::Result<Vec<RosterRow>, IngestionError> {
        std::fs::create_dir_all(&upload_dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix("roster-")
            .suffix(format.extension())
            .tempfile_in(&upload_dir)?;
        staged.write_all(&bytes)?;
        staged.flush()?;

        read_roster(staged.path(), &config)
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("Roster parsing task failed: {}", e),
    })??;

    Ok(rows)
}
