//! Pages, page requests and the tweet cursor codec.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::Tweet;
use crate::domain::types::TweetId;

/// One page of a feed in authoritative server order (newest first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub tweets: Vec<Tweet>,
    /// `None` marks the terminal page.
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(tweets: Vec<Tweet>, next_cursor: Option<String>) -> Self {
        Self {
            tweets,
            next_cursor,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<C = String> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TweetCursorPayload {
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    id: TweetId,
}

/// Position after the last tweet of a page, ordered by (created_at, id) descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetCursor {
    created_at: OffsetDateTime,
    id: TweetId,
}

impl TweetCursor {
    pub fn new(created_at: OffsetDateTime, id: TweetId) -> Self {
        Self { created_at, id }
    }

    /// Cursor pointing just past `tweet`.
    pub fn after(tweet: &Tweet) -> Self {
        Self::new(tweet.created_at, tweet.id.clone())
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> &TweetId {
        &self.id
    }

    /// True when `tweet` sorts strictly after this cursor position.
    pub fn precedes(&self, tweet: &Tweet) -> bool {
        (tweet.created_at, &tweet.id) < (self.created_at, &self.id)
    }

    pub fn encode(&self) -> Result<String, PaginationError> {
        let payload = TweetCursorPayload {
            created_at: self.created_at,
            id: self.id.clone(),
        };
        let serialized = serde_json::to_vec(&payload)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(serialized))
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: TweetCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::Author;
    use crate::domain::types::UserId;

    fn tweet(id: &str, created_at: OffsetDateTime) -> Tweet {
        Tweet {
            id: TweetId::from(id),
            author: Author {
                id: UserId::from("u1"),
                display_name: "Ada".to_string(),
                image: None,
            },
            content: String::new(),
            created_at,
            like_count: 0,
            liked_by_viewer: false,
        }
    }

    #[test]
    fn tweet_cursor_round_trip() {
        let when = datetime!(2024-05-01 10:30:00 UTC);
        let cursor = TweetCursor::new(when, TweetId::from("t42"));
        let encoded = cursor.encode().expect("encode cursor");
        let decoded = TweetCursor::decode(&encoded).expect("decoded cursor");

        assert_eq!(decoded.created_at(), when);
        assert_eq!(decoded.id(), &TweetId::from("t42"));
    }

    #[test]
    fn decoding_invalid_cursor_reports_error() {
        let err = TweetCursor::decode("not-base64!").expect_err("invalid cursor rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }

    #[test]
    fn cursor_orders_newest_first_with_id_tiebreak() {
        let when = datetime!(2024-05-01 10:30:00 UTC);
        let cursor = TweetCursor::after(&tweet("t5", when));

        assert!(cursor.precedes(&tweet("t4", when)));
        assert!(!cursor.precedes(&tweet("t5", when)));
        assert!(!cursor.precedes(&tweet("t6", when)));
        assert!(cursor.precedes(&tweet("t9", datetime!(2024-05-01 10:29:00 UTC))));
    }

    #[test]
    fn terminal_page_has_no_cursor() {
        assert!(Page::empty().is_terminal());
        assert!(!Page::new(Vec::new(), Some("c".to_string())).is_terminal());
    }
}
