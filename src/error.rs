use crate::domain::rules::Rejection;
use std::fmt;
use thiserror::Error;

/// Generic error categories callers fall back to when they do not
/// recognise a stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Unauthenticated,
    NotFound,
    PermissionDenied,
    InvalidArgument,
    FailedPrecondition,
    Aborted,
    Unavailable,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::InvalidArgument => "invalid-argument",
            Self::FailedPrecondition => "failed-precondition",
            Self::Aborted => "aborted",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SalonError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Rejected(#[from] Rejection),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("concurrent modification of {collection} document {key}")]
    Conflict { collection: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl SalonError {
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable identifier clients branch on before the category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "ERR_UNAUTHENTICATED",
            Self::Rejected(rejection) => rejection.code(),
            Self::NotFound { .. } => "ERR_NOT_FOUND",
            Self::PermissionDenied(_) => "ERR_PERMISSION_DENIED",
            Self::InvalidArgument(_) => "ERR_INVALID_ARGUMENT",
            Self::Conflict { .. } => "ERR_CONFLICT",
            Self::Unavailable(_) => "ERR_UNAVAILABLE",
            Self::Internal(_) | Self::Csv(_) | Self::Io(_) | Self::Config(_) => "ERR_INTERNAL",
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(_) => "ERR_UNAVAILABLE",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated => ErrorCategory::Unauthenticated,
            Self::Rejected(rejection) => rejection.category(),
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::Conflict { .. } => ErrorCategory::Aborted,
            Self::Unavailable(_) => ErrorCategory::Unavailable,
            Self::Internal(_) | Self::Csv(_) | Self::Io(_) | Self::Config(_) => {
                ErrorCategory::Internal
            }
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(_) => ErrorCategory::Unavailable,
        }
    }

    /// Business-rule violations are expected outcomes, not failures.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, SalonError>;
