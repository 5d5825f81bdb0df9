//! Cache configuration.
//!
//! Sizes the entity store and the pager via the `[feed]` settings table.

use std::num::{NonZeroU32, NonZeroUsize};

use serde::Deserialize;

const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_TWEET_LIMIT: usize = 1000;
const DEFAULT_PROFILE_LIMIT: usize = 100;

/// Feed cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tweets requested per page.
    pub page_size: u32,
    /// Maximum tweets held by the entity store.
    pub tweet_limit: usize,
    /// Maximum profiles held by the entity store.
    pub profile_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            tweet_limit: DEFAULT_TWEET_LIMIT,
            profile_limit: DEFAULT_PROFILE_LIMIT,
        }
    }
}

impl From<&crate::config::FeedSettings> for CacheConfig {
    fn from(settings: &crate::config::FeedSettings) -> Self {
        Self {
            page_size: settings.page_size.get(),
            tweet_limit: settings.tweet_limit.get(),
            profile_limit: settings.profile_limit.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the page size, clamping to 1 if zero.
    pub fn page_size_non_zero(&self) -> NonZeroU32 {
        NonZeroU32::new(self.page_size).unwrap_or(NonZeroU32::MIN)
    }

    pub fn tweet_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.tweet_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn profile_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.profile_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.tweet_limit, 1000);
        assert_eq!(config.profile_limit, 100);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            page_size: 0,
            tweet_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.page_size_non_zero().get(), 1);
        assert_eq!(config.tweet_limit_non_zero().get(), 1);
        assert_eq!(config.profile_limit_non_zero().get(), 100);
    }
}
