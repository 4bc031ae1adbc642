//! Ingestion error types

use thiserror::Error;
use vis4t_common::errors::AppError;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unsupported file format '{extension}': only .xlsx and .csv are accepted")]
    UnsupportedFormat { extension: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("File does not match the roster template: {message}")]
    TemplateMismatch { message: String },

    #[error("No student rows found after removing header and footer")]
    EmptyTable,

    #[error("Row {row}: student ID '{value}' is not a number")]
    InvalidStudentId { row: usize, value: String },

    #[error("Row {row}: column '{column}' has non-numeric value '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid seed data in {path}: {message}")]
    InvalidSeedData { path: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Storage(inner) => inner,
            IngestionError::Io(io) => AppError::Internal {
                message: format!("IO error: {}", io),
            },
            IngestionError::UnsupportedFormat { .. } | IngestionError::Parse { .. } => {
                AppError::InvalidFormat { message: e.to_string() }
            }
            IngestionError::EmptyTable => AppError::EmptyUpload,
            other => AppError::Validation {
                message: other.to_string(),
                field: Some("file".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors_map_to_bad_request() {
        let err: AppError = IngestionError::UnsupportedFormat {
            extension: "pdf".to_string(),
        }
        .into();
        assert_eq!(err.status_code().as_u16(), 400);

        let err: AppError = IngestionError::InvalidStudentId {
            row: 3,
            value: "abc".to_string(),
        }
        .into();
        assert_eq!(err.status_code().as_u16(), 400);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_io_errors_map_to_server_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let app: AppError = IngestionError::from(io).into();
        assert!(app.is_server_error());
    }
}
