use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Closed error taxonomy for the engine. Callers match on the kind,
/// never on message text.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record")]
    Duplicate,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("news source API error: {0}")]
    SourceApi(String),

    #[error("summarization API error: {0}")]
    SummaryApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Storage(rusqlite::Error),

    #[error("database connection error: {0}")]
    StorageConnection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            // A row lookup that came up empty is a missing record, not a
            // storage failure.
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            rusqlite::Error::SqliteFailure(code, message) => match code.extended_code {
                // Inserting a child row for a missing parent item.
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => AppError::NotFound,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    AppError::Duplicate
                }
                _ => AppError::Storage(rusqlite::Error::SqliteFailure(code, message)),
            },
            other => AppError::Storage(other),
        }
    }
}

impl From<tokio_rusqlite::Error> for AppError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => e.into(),
            other => AppError::StorageConnection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn unique_violation_maps_to_duplicate() {
        let code = ffi::Error {
            code: ffi::ErrorCode::ConstraintViolation,
            extended_code: ffi::SQLITE_CONSTRAINT_UNIQUE,
        };
        let err: AppError = rusqlite::Error::SqliteFailure(code, None).into();
        assert!(matches!(err, AppError::Duplicate));
    }

    #[test]
    fn foreign_key_violation_maps_to_not_found() {
        let code = ffi::Error {
            code: ffi::ErrorCode::ConstraintViolation,
            extended_code: ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
        };
        let err: AppError = rusqlite::Error::SqliteFailure(code, None).into();
        assert!(err.is_not_found());
    }
}
