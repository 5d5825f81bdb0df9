//! Feed projection: the ordered, deduplicated page list one view holds.
//!
//! Every operation is pure and returns a new projection; readers holding the
//! previous value keep seeing it unchanged.

use std::collections::HashSet;

use crate::application::pagination::Page;
use crate::domain::entities::Tweet;
use crate::domain::types::TweetId;

use super::keys::FeedIdentity;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedProjection {
    identity: FeedIdentity,
    pages: Vec<Page>,
    members: HashSet<TweetId>,
}

impl FeedProjection {
    /// An empty projection with no page fetched yet.
    pub fn new(identity: FeedIdentity) -> Self {
        Self {
            identity,
            pages: Vec::new(),
            members: HashSet::new(),
        }
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// True once at least one page has been appended.
    pub fn is_loaded(&self) -> bool {
        !self.pages.is_empty()
    }

    /// True iff the last page carried a continuation cursor.
    pub fn has_more(&self) -> bool {
        self.next_cursor().is_some()
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.pages.last().and_then(|page| page.next_cursor.as_deref())
    }

    pub fn contains(&self, id: &TweetId) -> bool {
        self.members.contains(id)
    }

    pub fn get(&self, id: &TweetId) -> Option<&Tweet> {
        if !self.contains(id) {
            return None;
        }
        self.tweets().find(|tweet| &tweet.id == id)
    }

    /// All tweets in display order.
    pub fn tweets(&self) -> impl Iterator<Item = &Tweet> {
        self.pages.iter().flat_map(|page| page.tweets.iter())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a fetched page, dropping tweets already present.
    ///
    /// The first occurrence of an id wins; overlapping pages happen when the
    /// server inserts rows between two page requests.
    pub fn append_page(&self, page: Page) -> Self {
        let mut next = self.clone();
        let Page {
            tweets,
            next_cursor,
        } = page;

        let mut fresh = Vec::with_capacity(tweets.len());
        for tweet in tweets {
            if next.members.insert(tweet.id.clone()) {
                fresh.push(tweet);
            }
        }
        next.pages.push(Page::new(fresh, next_cursor));
        next
    }

    /// Insert a tweet at the head of the first page.
    ///
    /// No-op when the tweet is already present or no page has been loaded.
    pub fn prepend_tweet(&self, tweet: Tweet) -> Self {
        if self.contains(&tweet.id) || self.pages.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        next.members.insert(tweet.id.clone());
        next.pages[0].tweets.insert(0, tweet);
        next
    }

    /// Replace the tweet `id` with `updater(existing)`; no-op when absent.
    pub fn patch<F>(&self, id: &TweetId, updater: F) -> Self
    where
        F: FnOnce(&Tweet) -> Tweet,
    {
        match self.get(id) {
            Some(existing) => {
                let updated = updater(existing);
                self.replace_tweet(id, updated)
            }
            None => self.clone(),
        }
    }

    /// Swap the tweet `id` for `replacement` in place.
    ///
    /// When the replacement carries a different id that is already present
    /// elsewhere, the old entry is dropped instead so ids stay unique.
    pub fn replace_tweet(&self, id: &TweetId, replacement: Tweet) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        if &replacement.id != id && self.contains(&replacement.id) {
            return self.remove_tweet(id);
        }

        let mut next = self.clone();
        next.members.remove(id);
        next.members.insert(replacement.id.clone());
        let mut replacement = Some(replacement);
        for page in &mut next.pages {
            if let Some(slot) = page.tweets.iter_mut().find(|tweet| &tweet.id == id) {
                if let Some(value) = replacement.take() {
                    *slot = value;
                }
                break;
            }
        }
        next
    }

    /// Drop the tweet `id`; no-op when absent. Pagination state is untouched.
    pub fn remove_tweet(&self, id: &TweetId) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.members.remove(id);
        for page in &mut next.pages {
            page.tweets.retain(|tweet| &tweet.id != id);
        }
        next
    }
}
