//! Entity store: canonical copies of tweets and profiles keyed by id.
//!
//! The store hands out clones, never references, so a projection can never
//! observe a change it did not publish itself.

use std::sync::RwLock;

use lru::LruCache;

use crate::domain::entities::{Profile, Tweet};
use crate::domain::types::{TweetId, UserId};

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub struct EntityStore {
    tweets: RwLock<LruCache<TweetId, Tweet>>,
    profiles: RwLock<LruCache<UserId, Profile>>,
}

impl EntityStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            tweets: RwLock::new(LruCache::new(config.tweet_limit_non_zero())),
            profiles: RwLock::new(LruCache::new(config.profile_limit_non_zero())),
        }
    }

    // ========================================================================
    // Tweets
    // ========================================================================

    /// Insert or overwrite a tweet by id. Idempotent.
    pub fn upsert(&self, tweet: Tweet) {
        rw_write(&self.tweets, SOURCE, "upsert").put(tweet.id.clone(), tweet);
    }

    pub fn upsert_all<I>(&self, tweets: I)
    where
        I: IntoIterator<Item = Tweet>,
    {
        let mut guard = rw_write(&self.tweets, SOURCE, "upsert_all");
        for tweet in tweets {
            guard.put(tweet.id.clone(), tweet);
        }
    }

    pub fn get(&self, id: &TweetId) -> Option<Tweet> {
        rw_write(&self.tweets, SOURCE, "get").get(id).cloned()
    }

    /// Compute the canonical tweet moved onto an authoritative like state.
    ///
    /// `None` when the tweet is unknown or already shows `liked_by_viewer`.
    /// The stored value is left untouched; callers decide whether to upsert.
    pub fn settle_like(&self, id: &TweetId, liked_by_viewer: bool) -> Option<Tweet> {
        rw_read(&self.tweets, SOURCE, "settle_like")
            .peek(id)
            .filter(|tweet| tweet.liked_by_viewer != liked_by_viewer)
            .map(|tweet| tweet.with_like_delta(like_step(liked_by_viewer), liked_by_viewer))
    }

    pub fn remove(&self, id: &TweetId) -> Option<Tweet> {
        rw_write(&self.tweets, SOURCE, "remove").pop(id)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.tweets, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub fn upsert_profile(&self, profile: Profile) {
        rw_write(&self.profiles, SOURCE, "upsert_profile").put(profile.id.clone(), profile);
    }

    pub fn profile(&self, id: &UserId) -> Option<Profile> {
        rw_write(&self.profiles, SOURCE, "profile").get(id).cloned()
    }
}

fn like_step(liked: bool) -> i64 {
    if liked { 1 } else { -1 }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::Author;

    fn sample_tweet(id: &str, like_count: u64) -> Tweet {
        Tweet {
            id: TweetId::from(id),
            author: Author {
                id: UserId::from("u1"),
                display_name: "Ada".to_string(),
                image: None,
            },
            content: format!("tweet {id}"),
            created_at: datetime!(2024-01-01 00:00 UTC),
            like_count,
            liked_by_viewer: false,
        }
    }

    #[test]
    fn upsert_overwrites_by_id() {
        let store = EntityStore::new(&CacheConfig::default());

        store.upsert(sample_tweet("t1", 1));
        store.upsert(sample_tweet("t1", 5));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&TweetId::from("t1")).expect("cached").like_count, 5);
    }

    #[test]
    fn settle_like_does_not_mutate_store() {
        let store = EntityStore::new(&CacheConfig::default());
        store.upsert(sample_tweet("t1", 3));

        let liked = store
            .settle_like(&TweetId::from("t1"), true)
            .expect("known tweet");
        assert_eq!(liked.like_count, 4);
        assert!(liked.liked_by_viewer);

        let stored = store.get(&TweetId::from("t1")).expect("cached");
        assert_eq!(stored.like_count, 3);
        assert!(!stored.liked_by_viewer);

        assert!(store.settle_like(&TweetId::from("missing"), true).is_none());
    }

    #[test]
    fn settle_like_skips_copies_already_in_that_state() {
        let store = EntityStore::new(&CacheConfig::default());
        store.upsert(sample_tweet("t1", 3));

        assert!(store.settle_like(&TweetId::from("t1"), false).is_none());
    }

    #[test]
    fn remove_pops_the_tweet() {
        let store = EntityStore::new(&CacheConfig::default());
        store.upsert(sample_tweet("t1", 0));

        assert!(store.remove(&TweetId::from("t1")).is_some());
        assert!(store.is_empty());
        assert!(store.remove(&TweetId::from("t1")).is_none());
    }

    #[test]
    fn lru_eviction_respects_limit() {
        let store = EntityStore::new(&CacheConfig {
            tweet_limit: 2,
            ..Default::default()
        });

        store.upsert_all([sample_tweet("t1", 0), sample_tweet("t2", 0)]);
        store.upsert(sample_tweet("t3", 0));

        assert!(store.get(&TweetId::from("t1")).is_none());
        assert!(store.get(&TweetId::from("t2")).is_some());
        assert!(store.get(&TweetId::from("t3")).is_some());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = EntityStore::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.tweets.write().expect("tweets lock should be acquired");
            panic!("poison tweets lock");
        }));

        store.upsert(sample_tweet("t1", 0));
        assert!(store.get(&TweetId::from("t1")).is_some());
    }
}
