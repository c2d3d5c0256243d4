use crate::db::errors::DbError;
use crate::types::{Operation, Resource};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Role or ownership check failed. Deliberately carries no information
    /// about whether the target row exists.
    #[error("Not authorized to {action} {resource}")]
    NotAuthorized { action: Operation, resource: Resource },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    Validation { message: String },

    /// Requested resource not found (after the caller passed the role check)
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: Resource, id: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_authorized(action: Operation, resource: Resource) -> Self {
        Error::NotAuthorized { action, resource }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into() }
    }

    pub fn not_found(resource: Resource, id: impl ToString) -> Self {
        Error::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::NotAuthorized { action, resource } => {
                format!("Not authorized to {action} {resource}")
            }
            Error::Validation { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { message, .. } => {
                    match message.as_str() {
                        m if m.contains("users.username") => "This username is already taken".to_string(),
                        m if m.contains("customers.owner_user_id") => "This user already owns a customer".to_string(),
                        _ => "Resource already exists".to_string(),
                    }
                }
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal error".to_string(),
        }
    }
}

pub fn log_error(err: &Error) {
    // Different log levels based on severity; infrastructure failures get the
    // full context chain.
    match err {
        Error::Database(DbError::Other(_)) | Error::Other(_) => {
            tracing::error!("Internal service error: {:#}", err);
        }
        Error::Database(_) => {
            tracing::warn!("Database constraint error: {}", err);
        }
        Error::NotAuthorized { .. } => {
            tracing::info!("Authorization error: {}", err);
        }
        Error::Validation { .. } | Error::NotFound { .. } => {
            tracing::debug!("Client error: {}", err);
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
