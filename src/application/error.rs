use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::Response;
use thiserror::Error;

use crate::application::backend::BackendError;
use crate::cache::{FeedIdentity, ViewHandle};
use crate::domain::error::DomainError;
use crate::domain::types::MutationKind;
use crate::infra::error::InfraError;

/// Failures surfaced by the feed engine.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(
        "fetching feed `{identity}` at cursor `{}` failed",
        .cursor.as_deref().unwrap_or("<start>")
    )]
    FetchFailed {
        identity: FeedIdentity,
        cursor: Option<String>,
        #[source]
        cause: BackendError,
    },
    #[error("{kind} on `{subject}` failed")]
    MutationFailed {
        kind: MutationKind,
        subject: String,
        #[source]
        cause: BackendError,
    },
    #[error("a viewer session is required for this action")]
    NotAuthenticated,
    #[error("{kind} on `{subject}` is already in flight")]
    MutationInFlight { kind: MutationKind, subject: String },
    #[error("{0} is not a live view")]
    UnknownView(ViewHandle),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl FeedError {
    /// Only page fetches are safe to retry; toggles and creates are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::FetchFailed { cause, .. } => cause.is_transient(),
            _ => false,
        }
    }

    pub fn backend_cause(&self) -> Option<&BackendError> {
        match self {
            FeedError::FetchFailed { cause, .. } | FeedError::MutationFailed { cause, .. } => {
                Some(cause)
            }
            _ => None,
        }
    }
}

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
