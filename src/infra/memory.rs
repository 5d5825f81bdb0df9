//! In-memory reference backend.
//!
//! Holds users, tweets, likes and follows for every viewer and answers the
//! feed contract the way a real server would. `InMemoryBackend::client` binds
//! a viewer to produce a `FeedBackend`; the development server calls the
//! viewer-explicit methods directly.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::application::backend::{BackendError, FeedBackend, FollowOutcome, LikeOutcome};
use crate::application::pagination::{Page, PageRequest, TweetCursor};
use crate::cache::FeedIdentity;
use crate::domain::entities::{Author, Profile, Tweet};
use crate::domain::types::{FeedScope, TweetId, UserId};
use crate::infra::error::InfraError;

const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
struct UserRecord {
    id: UserId,
    name: String,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct TweetRecord {
    id: TweetId,
    author: UserId,
    content: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct World {
    users: BTreeMap<UserId, UserRecord>,
    tweets: BTreeMap<TweetId, TweetRecord>,
    /// (user, tweet)
    likes: HashSet<(UserId, TweetId)>,
    /// (follower, followee)
    follows: HashSet<(UserId, UserId)>,
    next_tweet: u64,
    latest: Option<OffsetDateTime>,
}

impl World {
    fn user(&self, id: &UserId) -> Result<&UserRecord, BackendError> {
        self.users.get(id).ok_or(BackendError::NotFound)
    }

    fn like_count(&self, tweet: &TweetId) -> u64 {
        self.likes.iter().filter(|(_, liked)| liked == tweet).count() as u64
    }

    fn render(&self, record: &TweetRecord, viewer: Option<&UserId>) -> Tweet {
        let author = self.users.get(&record.author);
        Tweet {
            id: record.id.clone(),
            author: Author {
                id: record.author.clone(),
                display_name: author.map(|user| user.name.clone()).unwrap_or_default(),
                image: author.and_then(|user| user.image.clone()),
            },
            content: record.content.clone(),
            created_at: record.created_at,
            like_count: self.like_count(&record.id),
            liked_by_viewer: viewer
                .is_some_and(|viewer| self.likes.contains(&(viewer.clone(), record.id.clone()))),
        }
    }

    fn profile(&self, id: &UserId, viewer: Option<&UserId>) -> Result<Profile, BackendError> {
        let user = self.user(id)?;
        let tweets_count = self.tweets.values().filter(|t| &t.author == id).count() as u64;
        let followers_count = self.follows.iter().filter(|(_, followee)| followee == id).count();
        let follows_count = self.follows.iter().filter(|(follower, _)| follower == id).count();
        Ok(Profile {
            id: user.id.clone(),
            display_name: user.name.clone(),
            image: user.image.clone(),
            tweets_count,
            followers_count: followers_count as u64,
            follows_count: follows_count as u64,
            is_following: viewer
                .is_some_and(|viewer| self.follows.contains(&(viewer.clone(), id.clone()))),
        })
    }

    /// Tweets visible in `identity`, newest first.
    fn timeline(
        &self,
        identity: &FeedIdentity,
        viewer: Option<&UserId>,
    ) -> Result<Vec<&TweetRecord>, BackendError> {
        let mut tweets: Vec<&TweetRecord> = match identity.scope() {
            FeedScope::All => self.tweets.values().collect(),
            FeedScope::FollowingOnly => {
                let viewer = viewer.ok_or(BackendError::Unauthorized)?;
                self.tweets
                    .values()
                    .filter(|t| self.follows.contains(&(viewer.clone(), t.author.clone())))
                    .collect()
            }
            FeedScope::Profile => {
                let user_id = identity
                    .profile_user_id()
                    .ok_or_else(|| BackendError::invalid_input("profile feed requires a user id"))?;
                self.user(user_id)?;
                self.tweets
                    .values()
                    .filter(|t| &t.author == user_id)
                    .collect()
            }
        };
        tweets.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(tweets)
    }

    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let stamp = match self.latest {
            Some(latest) if now <= latest => latest + Duration::microseconds(1),
            _ => now,
        };
        self.latest = Some(stamp);
        stamp
    }
}

/// Shared in-memory world behind every viewer-bound client.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    world: RwLock<World>,
    offline: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Result<Self, BackendError> {
        let mut backend = Self::new();
        apply_seed(backend.world.get_mut(), seed)?;
        Ok(backend)
    }

    /// Bind a viewer; `None` yields an anonymous client.
    pub fn client(self: &Arc<Self>, viewer: Option<UserId>) -> MemoryClient {
        MemoryClient {
            backend: Arc::clone(self),
            viewer,
        }
    }

    /// Fault switch: while offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        info!(offline, "In-memory backend availability changed");
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.is_offline() {
            return Err(BackendError::Unavailable("backend is offline".to_string()));
        }
        Ok(())
    }

    pub async fn add_user(&self, id: impl Into<UserId>, name: impl Into<String>) {
        let id = id.into();
        let mut world = self.world.write().await;
        world.users.insert(
            id.clone(),
            UserRecord {
                id,
                name: name.into(),
                image: None,
            },
        );
    }

    pub async fn fetch_page(
        &self,
        viewer: Option<&UserId>,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError> {
        self.ensure_online()?;
        let limit = request.limit.clamp(1, MAX_PAGE_LIMIT) as usize;
        let cursor = request
            .cursor
            .as_deref()
            .map(TweetCursor::decode)
            .transpose()?;

        let world = self.world.read().await;
        let timeline = world.timeline(identity, viewer)?;
        let mut window: Vec<&TweetRecord> = timeline
            .into_iter()
            .filter(|record| match &cursor {
                Some(cursor) => {
                    (record.created_at, &record.id) < (cursor.created_at(), cursor.id())
                }
                None => true,
            })
            .take(limit + 1)
            .collect();

        let has_more = window.len() > limit;
        window.truncate(limit);
        let tweets: Vec<Tweet> = window
            .into_iter()
            .map(|record| world.render(record, viewer))
            .collect();
        let next_cursor = match (has_more, tweets.last()) {
            (true, Some(last)) => Some(TweetCursor::after(last).encode()?),
            _ => None,
        };
        debug!(%identity, tweets = tweets.len(), has_more, "Served feed page");
        Ok(Page::new(tweets, next_cursor))
    }

    pub async fn toggle_like(
        &self,
        viewer: &UserId,
        tweet_id: &TweetId,
    ) -> Result<LikeOutcome, BackendError> {
        self.ensure_online()?;
        let mut world = self.world.write().await;
        world.user(viewer)?;
        if !world.tweets.contains_key(tweet_id) {
            return Err(BackendError::NotFound);
        }
        let key = (viewer.clone(), tweet_id.clone());
        let added_like = if world.likes.remove(&key) {
            false
        } else {
            world.likes.insert(key);
            true
        };
        Ok(LikeOutcome { added_like })
    }

    pub async fn toggle_follow(
        &self,
        viewer: &UserId,
        target: &UserId,
    ) -> Result<FollowOutcome, BackendError> {
        self.ensure_online()?;
        if viewer == target {
            return Err(BackendError::invalid_input("users cannot follow themselves"));
        }
        let mut world = self.world.write().await;
        world.user(viewer)?;
        world.user(target)?;
        let key = (viewer.clone(), target.clone());
        let added_follow = if world.follows.remove(&key) {
            false
        } else {
            world.follows.insert(key);
            true
        };
        Ok(FollowOutcome { added_follow })
    }

    pub async fn create_tweet(&self, viewer: &UserId, content: &str) -> Result<Tweet, BackendError> {
        self.ensure_online()?;
        if content.trim().is_empty() {
            return Err(BackendError::invalid_input("content must not be empty"));
        }
        let mut world = self.world.write().await;
        world.user(viewer)?;
        let id = loop {
            world.next_tweet += 1;
            let id = TweetId::new(format!("t{}", world.next_tweet));
            if !world.tweets.contains_key(&id) {
                break id;
            }
        };
        let record = TweetRecord {
            id,
            author: viewer.clone(),
            content: content.to_string(),
            created_at: world.next_timestamp(),
        };
        let tweet = world.render(&record, Some(viewer));
        world.tweets.insert(record.id.clone(), record);
        Ok(tweet)
    }

    pub async fn profile(
        &self,
        viewer: Option<&UserId>,
        user_id: &UserId,
    ) -> Result<Profile, BackendError> {
        self.ensure_online()?;
        self.world.read().await.profile(user_id, viewer)
    }

    pub async fn tweet_count(&self) -> usize {
        self.world.read().await.tweets.len()
    }
}

/// A viewer-bound handle on an `InMemoryBackend`.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    backend: Arc<InMemoryBackend>,
    viewer: Option<UserId>,
}

impl MemoryClient {
    pub fn backend(&self) -> &Arc<InMemoryBackend> {
        &self.backend
    }

    fn viewer(&self) -> Result<&UserId, BackendError> {
        self.viewer.as_ref().ok_or(BackendError::Unauthorized)
    }
}

#[async_trait]
impl FeedBackend for MemoryClient {
    async fn fetch_feed_page(
        &self,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError> {
        self.backend
            .fetch_page(self.viewer.as_ref(), identity, request)
            .await
    }

    async fn toggle_like(&self, tweet_id: &TweetId) -> Result<LikeOutcome, BackendError> {
        self.backend.toggle_like(self.viewer()?, tweet_id).await
    }

    async fn toggle_follow(&self, user_id: &UserId) -> Result<FollowOutcome, BackendError> {
        self.backend.toggle_follow(self.viewer()?, user_id).await
    }

    async fn create_tweet(&self, content: &str) -> Result<Tweet, BackendError> {
        self.backend.create_tweet(self.viewer()?, content).await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        self.backend.profile(self.viewer.as_ref(), user_id).await
    }
}

// ============================================================================
// Seed data
// ============================================================================

/// Initial world state, usually read from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub users: Vec<SeedUser>,
    pub tweets: Vec<SeedTweet>,
    pub follows: Vec<SeedFollow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTweet {
    pub id: String,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub liked_by: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedFollow {
    pub follower: String,
    pub followee: String,
}

impl SeedData {
    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw)
            .map_err(|err| InfraError::configuration(format!("invalid seed file: {err}")))
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&raw)
    }

    /// A small world for local runs without a seed file.
    pub fn demo() -> Self {
        let start = OffsetDateTime::now_utc() - Duration::hours(1);
        let users = [("ada", "Ada"), ("grace", "Grace"), ("alan", "Alan")];
        let tweets = (1..=25)
            .map(|n: i64| {
                let (author, _) = users[(n as usize) % users.len()];
                SeedTweet {
                    id: format!("seed-{n:03}"),
                    author: author.to_string(),
                    content: format!("Seeded tweet number {n}"),
                    created_at: start + Duration::minutes(n),
                    liked_by: if n % 4 == 0 {
                        vec!["grace".to_string()]
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();

        Self {
            users: users
                .iter()
                .map(|(id, name)| SeedUser {
                    id: id.to_string(),
                    name: name.to_string(),
                    image: None,
                })
                .collect(),
            tweets,
            follows: vec![SeedFollow {
                follower: "ada".to_string(),
                followee: "grace".to_string(),
            }],
        }
    }
}

fn apply_seed(world: &mut World, seed: SeedData) -> Result<(), BackendError> {
    for user in seed.users {
        let id = UserId::new(user.id);
        world.users.insert(
            id.clone(),
            UserRecord {
                id,
                name: user.name,
                image: user.image,
            },
        );
    }

    for tweet in seed.tweets {
        let author = UserId::new(tweet.author);
        world.user(&author)?;
        let id = TweetId::new(tweet.id);
        for liker in tweet.liked_by {
            let liker = UserId::new(liker);
            world.user(&liker)?;
            world.likes.insert((liker, id.clone()));
        }
        if world.latest.is_none_or(|latest| tweet.created_at > latest) {
            world.latest = Some(tweet.created_at);
        }
        world.tweets.insert(
            id.clone(),
            TweetRecord {
                id,
                author,
                content: tweet.content,
                created_at: tweet.created_at,
            },
        );
    }

    for follow in seed.follows {
        let follower = UserId::new(follow.follower);
        let followee = UserId::new(follow.followee);
        world.user(&follower)?;
        world.user(&followee)?;
        if follower == followee {
            return Err(BackendError::invalid_input("users cannot follow themselves"));
        }
        world.follows.insert((follower, followee));
    }

    world.next_tweet = world.tweets.len() as u64;
    Ok(())
}
