//! Addressing keys for feed projections and live views.

use std::fmt;

use crate::domain::types::{FeedScope, UserId};

/// Value-equality key naming which tweets a feed shows.
///
/// Two identities are equal iff scope and profile user match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedIdentity {
    scope: FeedScope,
    profile_user_id: Option<UserId>,
}

impl FeedIdentity {
    /// The global, most-recent-first feed.
    pub fn all() -> Self {
        Self {
            scope: FeedScope::All,
            profile_user_id: None,
        }
    }

    /// Tweets from users the viewer follows.
    pub fn following() -> Self {
        Self {
            scope: FeedScope::FollowingOnly,
            profile_user_id: None,
        }
    }

    /// Tweets authored by one user.
    pub fn profile(user_id: impl Into<UserId>) -> Self {
        Self {
            scope: FeedScope::Profile,
            profile_user_id: Some(user_id.into()),
        }
    }

    pub fn scope(&self) -> FeedScope {
        self.scope
    }

    pub fn profile_user_id(&self) -> Option<&UserId> {
        self.profile_user_id.as_ref()
    }

    /// True when this feed shows the given user's profile.
    pub fn is_profile_of(&self, user_id: &UserId) -> bool {
        self.scope == FeedScope::Profile && self.profile_user_id.as_ref() == Some(user_id)
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.profile_user_id {
            Some(user_id) => write!(f, "{}:{user_id}", self.scope.as_str()),
            None => f.write_str(self.scope.as_str()),
        }
    }
}

/// Handle returned by a subscription; identifies one live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(u64);

impl ViewHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}
