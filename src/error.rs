// Error taxonomy for the upload pipeline and the dashboard client

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading or parsing one uploaded CSV file
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read upload {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: column {column} has malformed value {value:?}")]
    MalformedField {
        line: u64,
        column: &'static str,
        value: String,
    },
}

impl IngestError {
    /// True when the file itself could not be read (as opposed to bad content)
    pub fn is_file_read(&self) -> bool {
        match self {
            IngestError::FileRead { .. } => true,
            IngestError::Csv(e) => matches!(e.kind(), csv::ErrorKind::Io(_)),
            IngestError::MalformedField { .. } => false,
        }
    }
}

/// A batch could not be stored; nothing from it was committed
#[derive(Error, Debug)]
pub enum PersistenceFailure {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] rusqlite::Error),

    #[error("insert of record {index} failed: {source}")]
    Insert {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] rusqlite::Error),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Upload request from the dashboard failed or was rejected
#[derive(Error, Debug, Clone, PartialEq)]
#[error("upload request failed: {reason}")]
pub struct NetworkFailure {
    pub reason: String,
}

impl NetworkFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "server")]
pub use http::AppError;

#[cfg(feature = "server")]
mod http {
    use super::{IngestError, PersistenceFailure};
    use axum::{
        extract::multipart::MultipartError,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use thiserror::Error;

    /// Request-boundary error, rendered as a plain-text response
    #[derive(Error, Debug)]
    pub enum AppError {
        #[error("Malformed upload: {0}")]
        MalformedUpload(String),

        #[error("Malformed multipart body: {}", .0.body_text())]
        Multipart(#[from] MultipartError),

        #[error("Failed to read uploaded file")]
        FileRead(#[source] IngestError),

        #[error("Failed to persist uploaded data")]
        Persistence(#[from] PersistenceFailure),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl From<IngestError> for AppError {
        fn from(err: IngestError) -> Self {
            if err.is_file_read() {
                AppError::FileRead(err)
            } else {
                AppError::MalformedUpload(err.to_string())
            }
        }
    }

    impl From<std::io::Error> for AppError {
        fn from(err: std::io::Error) -> Self {
            AppError::Internal(err.to_string())
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = match &self {
                AppError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
                AppError::Multipart(e) => e.status(),
                AppError::FileRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };

            (status, self.to_string()).into_response()
        }
    }
}
