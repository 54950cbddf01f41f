//! Error types for the chat system.

use teamhub_database::DatabaseError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat system
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid {field}: {value:?} is not a valid id")]
    InvalidReference { field: String, value: String },

    #[error("A message must target exactly one chat or one group")]
    InvalidTarget,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("The group must keep at least one admin")]
    LastAdminViolation,

    #[error("You are the last member of this group; delete the group instead")]
    LastMemberMustDelete,

    #[error("Already exists: {what}")]
    AlreadyExists { what: String },

    #[error("Nothing to do: {reason}")]
    NoOp { reason: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },
}

impl ChatError {
    pub fn invalid_reference(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidReference {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound { entity: entity.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden { reason: reason.into() }
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    pub fn no_op(reason: impl Into<String>) -> Self {
        Self::NoOp { reason: reason.into() }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "invalid_reference",
            Self::InvalidTarget => "invalid_target",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::LastAdminViolation => "last_admin_violation",
            Self::LastMemberMustDelete => "last_member_must_delete",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NoOp { .. } => "no_op",
            Self::StoreUnavailable { .. } => "store_unavailable",
        }
    }
}

impl From<DatabaseError> for ChatError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(entity) => Self::NotFound { entity },
            DatabaseError::Duplicate(what) => Self::AlreadyExists { what },
            other => Self::StoreUnavailable {
                message: other.to_string(),
            },
        }
    }
}
