//! Feed entities as held by the client cache.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::types::{TweetId, UserId};

const PROVISIONAL_ID_PREFIX: &str = "tmp-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: UserId,
    pub display_name: String,
    pub image: Option<String>,
}

/// A post as shown in a feed.
///
/// Values are immutable once built: every change produces a new `Tweet`, so
/// two projections never alias the same mutable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tweet {
    pub id: TweetId,
    pub author: Author,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub like_count: u64,
    pub liked_by_viewer: bool,
}

impl Tweet {
    /// Build a client-side placeholder for a tweet the viewer just submitted.
    pub fn provisional(viewer: &Viewer, content: &str, created_at: OffsetDateTime) -> Self {
        Self {
            id: TweetId::new(format!("{PROVISIONAL_ID_PREFIX}{}", Uuid::new_v4())),
            author: viewer.as_author(),
            content: content.to_string(),
            created_at,
            like_count: 0,
            liked_by_viewer: false,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.as_str().starts_with(PROVISIONAL_ID_PREFIX)
    }

    /// Returns a copy with the like count shifted by `delta` (never below zero).
    pub fn with_like_delta(&self, delta: i64, liked_by_viewer: bool) -> Self {
        Self {
            like_count: self.like_count.saturating_add_signed(delta),
            liked_by_viewer,
            ..self.clone()
        }
    }

    /// Returns a copy with viewer-specific state cleared.
    pub fn anonymized(self) -> Self {
        Self {
            liked_by_viewer: false,
            ..self
        }
    }
}

/// Header data of a user's profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub image: Option<String>,
    pub tweets_count: u64,
    pub followers_count: u64,
    pub follows_count: u64,
    pub is_following: bool,
}

impl Profile {
    pub fn with_follow_delta(&self, delta: i64, is_following: bool) -> Self {
        Self {
            followers_count: self.followers_count.saturating_add_signed(delta),
            is_following,
            ..self.clone()
        }
    }

    pub fn with_tweets_delta(&self, delta: i64) -> Self {
        Self {
            tweets_count: self.tweets_count.saturating_add_signed(delta),
            ..self.clone()
        }
    }
}

/// The authenticated user of the client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Viewer {
    pub id: UserId,
    pub display_name: String,
    pub image: Option<String>,
}

impl Viewer {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            image: None,
        }
    }

    pub fn as_author(&self) -> Author {
        Author {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            image: self.image.clone(),
        }
    }
}

/// Reject whitespace-only content. Accepted content is returned as typed.
pub fn validate_content(content: &str) -> Result<&str, DomainError> {
    if content.trim().is_empty() {
        return Err(DomainError::validation("tweet content must not be empty"));
    }
    Ok(content)
}
