//! Wire types for the murmur feed backend.
//!
//! Field names follow the camelCase JSON the feed backend speaks. Domain
//! conversions live in the `murmur` crate so this crate stays dependency-light.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Header carrying the authenticated viewer id on every request.
pub const VIEWER_HEADER: &str = "x-murmur-viewer";

pub const FEED_PATH: &str = "/api/feed";
pub const TWEETS_PATH: &str = "/api/tweets";

pub fn like_path(tweet_id: &str) -> String {
    format!("/api/tweets/{tweet_id}/like")
}

pub fn follow_path(user_id: &str) -> String {
    format!("/api/users/{user_id}/follow")
}

pub fn profile_path(user_id: &str) -> String {
    format!("/api/profiles/{user_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScopeParam {
    All,
    Following,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPageQuery {
    pub scope: FeedScopeParam,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetDto {
    pub id: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: u64,
    pub liked_by_me: bool,
    pub user: AuthorDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPageResponse {
    pub tweets: Vec<TweetDto>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeResponse {
    pub added_like: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFollowResponse {
    pub added_follow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTweetRequest {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub tweets_count: u64,
    pub followers_count: u64,
    pub follows_count: u64,
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_CURSOR: &str = "invalid_cursor";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UNAVAILABLE: &str = "unavailable";
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn tweet_dto_uses_camel_case_and_rfc3339() {
        let dto = TweetDto {
            id: "t1".to_string(),
            content: "hello".to_string(),
            created_at: datetime!(2024-03-01 12:00 UTC),
            like_count: 3,
            liked_by_me: true,
            user: AuthorDto {
                id: "u1".to_string(),
                name: Some("Ada".to_string()),
                image: None,
            },
        };

        let value = serde_json::to_value(&dto).expect("serialize tweet");
        assert_eq!(value["likeCount"], 3);
        assert_eq!(value["likedByMe"], true);
        assert_eq!(value["createdAt"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn feed_query_omits_absent_fields() {
        let query = FeedPageQuery {
            scope: FeedScopeParam::Following,
            user_id: None,
            cursor: None,
            limit: Some(10),
        };

        let value = serde_json::to_value(&query).expect("serialize query");
        assert_eq!(value["scope"], "following");
        assert!(value.get("userId").is_none());
        assert!(value.get("cursor").is_none());
    }

    #[test]
    fn paths_embed_ids() {
        assert_eq!(like_path("t9"), "/api/tweets/t9/like");
        assert_eq!(follow_path("u2"), "/api/users/u2/follow");
        assert_eq!(profile_path("u2"), "/api/profiles/u2");
    }
}
