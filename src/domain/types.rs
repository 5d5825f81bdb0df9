//! Identifiers and small enumerations shared across the feed cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque tweet identifier assigned by the backend (or the client for
/// provisional tweets).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TweetId(String);

/// Opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(TweetId);
string_id!(UserId);

/// Which slice of the timeline a feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScope {
    All,
    FollowingOnly,
    Profile,
}

impl FeedScope {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedScope::All => "all",
            FeedScope::FollowingOnly => "following",
            FeedScope::Profile => "profile",
        }
    }
}

/// Mutation families the patch engine knows how to apply optimistically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    LikeToggle,
    FollowToggle,
    Create,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::LikeToggle => "like_toggle",
            MutationKind::FollowToggle => "follow_toggle",
            MutationKind::Create => "create",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
