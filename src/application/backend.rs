//! Backend contract consumed by the feed cache.
//!
//! Implementations are bound to one client session; the viewer identity
//! travels with the transport, not with each call.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{Page, PageRequest, PaginationError};
use crate::cache::FeedIdentity;
use crate::domain::entities::{Profile, Tweet};
use crate::domain::types::{TweetId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("resource not found")]
    NotFound,
    #[error("viewer session required")]
    Unauthorized,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Failures a read-only caller may retry at the same cursor.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Transport(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub added_like: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOutcome {
    pub added_follow: bool,
}

#[async_trait]
pub trait FeedBackend: Send + Sync {
    /// Fetch one page of `identity`; a `None` cursor requests the first page.
    async fn fetch_feed_page(
        &self,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError>;

    /// Flip the viewer's like on a tweet; the server decides the direction.
    async fn toggle_like(&self, tweet_id: &TweetId) -> Result<LikeOutcome, BackendError>;

    /// Flip whether the viewer follows a user.
    async fn toggle_follow(&self, user_id: &UserId) -> Result<FollowOutcome, BackendError>;

    /// Create a tweet authored by the viewer.
    async fn create_tweet(&self, content: &str) -> Result<Tweet, BackendError>;

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError>;
}
