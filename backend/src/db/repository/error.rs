//! Failures reported by note storage backends.
//!
//! Every variant carries a message and an [`ErrorContext`] recording which
//! repository operation failed, which note it concerned and whether replaying
//! the operation may succeed.

use std::fmt;

use crate::models::NoteId;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Where a repository failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Repository operation, e.g. `"update"` or `"find_many"`
    pub operation: Option<&'static str>,
    /// The note the operation targeted
    pub note_id: Option<NoteId>,
    /// Backend specific detail (pool state, database error kind, ...)
    pub details: Option<String>,
    pub retryable: bool,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if let Some(operation) = self.operation {
            parts.push(format!("operation={}", operation));
        }
        if let Some(id) = self.note_id {
            parts.push(format!("note={}", id));
        }
        if let Some(details) = &self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable".to_string());
        }

        if parts.is_empty() {
            Ok(())
        } else {
            write!(f, " [{}]", parts.join(", "))
        }
    }
}

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The backend could not be reached.
    #[error("Connection error: {message}{context}")]
    ConnectionError {
        message: String,
        context: ErrorContext,
    },

    /// A statement reached the database and failed there.
    #[error("Query error: {message}{context}")]
    QueryError {
        message: String,
        context: ErrorContext,
    },

    /// A by-id write matched no note.
    #[error("Not found: {message}{context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Arguments rejected before any storage call.
    #[error("Data validation error: {message}{context}")]
    ValidationError {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },

    #[error("Internal error: {message}{context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },

    /// A transaction was rolled back.
    #[error("Transaction error: {message}{context}")]
    TransactionError {
        message: String,
        context: ErrorContext,
    },

    /// No pooled connection became available in time.
    #[error("Timeout error: {message}{context}")]
    TimeoutError {
        message: String,
        context: ErrorContext,
    },
}

fn transient() -> ErrorContext {
    ErrorContext {
        retryable: true,
        ..Default::default()
    }
}

impl RepositoryError {
    /// Backend unreachable. Always retryable.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: transient(),
        }
    }

    /// Pool checkout timed out. Always retryable.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError {
            message: message.into(),
            context: transient(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// No note with `id` exists.
    pub fn not_found(id: NoteId) -> Self {
        Self::NotFound {
            message: format!("Note {} not found", id),
            context: ErrorContext {
                note_id: Some(id),
                ..Default::default()
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Record the repository operation that failed.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.context_mut().operation = Some(operation);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.context_mut().details = Some(details.into());
        self
    }

    /// Mark the failure as safe to replay.
    pub fn retryable(mut self) -> Self {
        self.context_mut().retryable = true;
        self
    }

    /// The bare message, without variant prefix or context.
    pub fn message(&self) -> &str {
        self.parts().0
    }

    pub fn context(&self) -> &ErrorContext {
        self.parts().1
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn parts(&self) -> (&str, &ErrorContext) {
        match self {
            Self::ConnectionError { message, context }
            | Self::QueryError { message, context }
            | Self::NotFound { message, context }
            | Self::ValidationError { message, context }
            | Self::ConfigurationError { message, context }
            | Self::InternalError { message, context }
            | Self::TransactionError { message, context }
            | Self::TimeoutError { message, context } => (message, context),
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::ConnectionError { context, .. }
            | Self::QueryError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ValidationError { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::InternalError { context, .. }
            | Self::TransactionError { context, .. }
            | Self::TimeoutError { context, .. } => context,
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(kind, info) => {
                let err = RepositoryError::query(info.message())
                    .with_details(format!("db_error_kind={:?}", kind));
                // Postgres aborted the transaction to keep it serializable.
                if matches!(kind, DatabaseErrorKind::SerializationFailure) {
                    err.retryable()
                } else {
                    err
                }
            }
            Error::NotFound => RepositoryError::NotFound {
                message: "Record not found".to_string(),
                context: ErrorContext::default(),
            },
            Error::RollbackTransaction => RepositoryError::TransactionError {
                message: "Transaction rolled back".to_string(),
                context: ErrorContext::default(),
            },
            Error::DeserializationError(e) | Error::SerializationError(e) => {
                RepositoryError::internal(e.to_string())
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::timeout(err.to_string()).with_details("pool checkout")
    }
}
