//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, Semaphore};

use murmur::application::backend::{BackendError, FeedBackend, FollowOutcome, LikeOutcome};
use murmur::application::engine::FeedEngine;
use murmur::application::pagination::{Page, PageRequest};
use murmur::application::session::Session;
use murmur::cache::{CacheConfig, FeedIdentity};
use murmur::domain::entities::{Author, Profile, Tweet, Viewer};
use murmur::domain::types::{TweetId, UserId};
use murmur::infra::memory::{InMemoryBackend, MemoryClient, SeedData};
use time::OffsetDateTime;

/// Small world: grace wrote t1..t3 (t1 has three likes), ada follows nobody.
pub const SEED: &str = r#"
[[users]]
id = "ada"
name = "Ada"

[[users]]
id = "grace"
name = "Grace"

[[users]]
id = "bob"
name = "Bob"

[[users]]
id = "carol"
name = "Carol"

[[users]]
id = "dave"
name = "Dave"

[[tweets]]
id = "t1"
author = "grace"
content = "first"
created_at = "2026-01-01T10:00:00Z"
liked_by = ["bob", "carol", "dave"]

[[tweets]]
id = "t2"
author = "grace"
content = "second"
created_at = "2026-01-01T11:00:00Z"

[[tweets]]
id = "t3"
author = "bob"
content = "third"
created_at = "2026-01-01T12:00:00Z"
"#;

pub fn world() -> Arc<InMemoryBackend> {
    let seed = SeedData::from_toml(SEED).expect("seed should parse");
    Arc::new(InMemoryBackend::from_seed(seed).expect("seed should apply"))
}

pub fn config(page_size: u32) -> CacheConfig {
    CacheConfig {
        page_size,
        ..Default::default()
    }
}

pub fn ada() -> Session {
    Session::authenticated(Viewer::new("ada", "Ada"))
}

/// Engine bound to `viewer` over the shared in-memory world.
pub fn engine_for(world: &Arc<InMemoryBackend>, viewer: &str, page_size: u32) -> FeedEngine {
    let client = world.client(Some(UserId::from(viewer)));
    FeedEngine::new(Arc::new(client), &config(page_size))
}

pub fn tweet(id: &str, like_count: u64, liked_by_viewer: bool) -> Tweet {
    Tweet {
        id: TweetId::from(id),
        author: Author {
            id: UserId::from("grace"),
            display_name: "Grace".to_string(),
            image: None,
        },
        content: format!("tweet {id}"),
        created_at: OffsetDateTime::UNIX_EPOCH,
        like_count,
        liked_by_viewer,
    }
}

/// One-shot pause point: the next backend call after `arm` blocks until `open`.
pub struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Memory client whose calls can be held at a [`Gate`].
///
/// By default a call parks before reaching the store. With `hold_replies` the
/// store applies the call first and only the reply is held.
pub struct GatedBackend {
    pub inner: MemoryClient,
    pub gate: Arc<Gate>,
    hold_replies: bool,
}

impl GatedBackend {
    pub fn new(world: &Arc<InMemoryBackend>, viewer: Option<&str>) -> (Arc<Self>, Arc<Gate>) {
        Self::build(world, viewer, false)
    }

    pub fn holding_replies(
        world: &Arc<InMemoryBackend>,
        viewer: Option<&str>,
    ) -> (Arc<Self>, Arc<Gate>) {
        Self::build(world, viewer, true)
    }

    fn build(
        world: &Arc<InMemoryBackend>,
        viewer: Option<&str>,
        hold_replies: bool,
    ) -> (Arc<Self>, Arc<Gate>) {
        let gate = Gate::new();
        let backend = Arc::new(Self {
            inner: world.client(viewer.map(UserId::from)),
            gate: Arc::clone(&gate),
            hold_replies,
        });
        (backend, gate)
    }

    async fn through<T>(&self, call: impl Future<Output = T>) -> T {
        if !self.hold_replies {
            self.gate.pass().await;
        }
        let reply = call.await;
        if self.hold_replies {
            self.gate.pass().await;
        }
        reply
    }
}

#[async_trait]
impl FeedBackend for GatedBackend {
    async fn fetch_feed_page(
        &self,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError> {
        self.through(self.inner.fetch_feed_page(identity, request)).await
    }

    async fn toggle_like(&self, tweet_id: &TweetId) -> Result<LikeOutcome, BackendError> {
        self.through(self.inner.toggle_like(tweet_id)).await
    }

    async fn toggle_follow(&self, user_id: &UserId) -> Result<FollowOutcome, BackendError> {
        self.through(self.inner.toggle_follow(user_id)).await
    }

    async fn create_tweet(&self, content: &str) -> Result<Tweet, BackendError> {
        self.through(self.inner.create_tweet(content)).await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Profile, BackendError> {
        self.through(self.inner.get_profile(user_id)).await
    }
}

/// Backend replaying canned pages and mutation answers in order.
///
/// Creates pass through `gate` so a test can act while one is in flight.
#[derive(Default)]
pub struct ScriptedBackend {
    pub pages: Mutex<VecDeque<Result<Page, BackendError>>>,
    pub likes: Mutex<VecDeque<Result<LikeOutcome, BackendError>>>,
    pub follows: Mutex<VecDeque<Result<FollowOutcome, BackendError>>>,
    pub creates: Mutex<VecDeque<Result<Tweet, BackendError>>>,
    pub profiles: Mutex<VecDeque<Profile>>,
    pub requests: Mutex<Vec<(FeedIdentity, Option<String>)>>,
    pub gate: Arc<Gate>,
}

impl ScriptedBackend {
    pub fn with_pages(pages: Vec<Result<Page, BackendError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Default::default()
        }
    }
}

fn unscripted<T>() -> Result<T, BackendError> {
    Err(BackendError::Unavailable("no scripted answer".to_string()))
}

#[async_trait]
impl FeedBackend for ScriptedBackend {
    async fn fetch_feed_page(
        &self,
        identity: &FeedIdentity,
        request: PageRequest,
    ) -> Result<Page, BackendError> {
        self.requests
            .lock()
            .await
            .push((identity.clone(), request.cursor));
        self.pages
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Page::empty()))
    }

    async fn toggle_like(&self, _tweet_id: &TweetId) -> Result<LikeOutcome, BackendError> {
        self.likes.lock().await.pop_front().unwrap_or_else(unscripted)
    }

    async fn toggle_follow(&self, _user_id: &UserId) -> Result<FollowOutcome, BackendError> {
        self.follows.lock().await.pop_front().unwrap_or_else(unscripted)
    }

    async fn create_tweet(&self, _content: &str) -> Result<Tweet, BackendError> {
        self.gate.pass().await;
        self.creates.lock().await.pop_front().unwrap_or_else(unscripted)
    }

    async fn get_profile(&self, _user_id: &UserId) -> Result<Profile, BackendError> {
        self.profiles
            .lock()
            .await
            .pop_front()
            .ok_or(BackendError::NotFound)
    }
}

pub fn profile(id: &str, followers_count: u64, is_following: bool) -> Profile {
    Profile {
        id: UserId::from(id),
        display_name: id.to_string(),
        image: None,
        tweets_count: 0,
        followers_count,
        follows_count: 0,
        is_following,
    }
}
