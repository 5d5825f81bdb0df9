//! Live views: the publish point between the engine and a subscribing view.
//!
//! A `LiveView` holds the current `FeedSnapshot` behind a watch channel.
//! Every change is published as a whole new snapshot, so consumers see either
//! the old state or the new one, never a partial patch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, watch};

use crate::domain::entities::Profile;

use super::keys::{FeedIdentity, ViewHandle};
use super::projection::FeedProjection;

/// Load state of a view, surfaced next to its pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Failed { message: String },
}

/// What a view renders from: pages, optional profile header and load state.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub projection: Arc<FeedProjection>,
    pub profile: Option<Arc<Profile>>,
    pub status: FeedStatus,
}

impl FeedSnapshot {
    fn empty(identity: FeedIdentity) -> Self {
        Self {
            projection: Arc::new(FeedProjection::new(identity)),
            profile: None,
            status: FeedStatus::Idle,
        }
    }
}

pub struct LiveView {
    handle: ViewHandle,
    identity: FeedIdentity,
    state: watch::Sender<FeedSnapshot>,
    generation: AtomicU64,
    fetch_gate: Arc<Mutex<()>>,
}

impl LiveView {
    pub(crate) fn new(handle: ViewHandle, identity: FeedIdentity) -> Self {
        let (state, _) = watch::channel(FeedSnapshot::empty(identity.clone()));
        Self {
            handle,
            identity,
            state,
            generation: AtomicU64::new(0),
            fetch_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    pub fn projection(&self) -> Arc<FeedProjection> {
        Arc::clone(&self.state.borrow().projection)
    }

    pub fn profile(&self) -> Option<Arc<Profile>> {
        self.state.borrow().profile.clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    /// Bumped on every reset; fetches started under an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Publish the projection returned by `update`; `None` means unchanged.
    pub(crate) fn update_projection<F>(&self, update: F) -> bool
    where
        F: FnOnce(&FeedProjection) -> Option<FeedProjection>,
    {
        self.state.send_if_modified(|snapshot| match update(&*snapshot.projection) {
            Some(next) => {
                snapshot.projection = Arc::new(next);
                true
            }
            None => false,
        })
    }

    /// Publish the profile returned by `update`; `None` means unchanged.
    pub(crate) fn update_profile<F>(&self, update: F) -> bool
    where
        F: FnOnce(Option<&Profile>) -> Option<Profile>,
    {
        self.state
            .send_if_modified(|snapshot| match update(snapshot.profile.as_deref()) {
                Some(next) => {
                    snapshot.profile = Some(Arc::new(next));
                    true
                }
                None => false,
            })
    }

    pub(crate) fn set_status(&self, status: FeedStatus) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.status == status {
                return false;
            }
            snapshot.status = status;
            true
        });
    }

    /// Drop all pages and start over from the first page.
    pub(crate) fn reset(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let identity = self.identity.clone();
        self.state.send_modify(|snapshot| {
            snapshot.projection = Arc::new(FeedProjection::new(identity));
            snapshot.status = FeedStatus::Idle;
        });
        generation
    }

    /// Serializes page fetches for this view.
    ///
    /// The permit is owned so a fetch can hold it without keeping the view alive.
    pub(crate) async fn fetch_permit(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.fetch_gate).lock_owned().await
    }
}

/// The subscribing view's owning handle on its projection.
///
/// Dropping it ends the projection's lifetime; the registry only keeps a
/// weak reference.
pub struct FeedSubscription {
    view: Arc<LiveView>,
    updates: watch::Receiver<FeedSnapshot>,
}

impl FeedSubscription {
    pub(crate) fn new(view: Arc<LiveView>) -> Self {
        let updates = view.watch();
        Self { view, updates }
    }

    pub fn handle(&self) -> ViewHandle {
        self.view.handle()
    }

    pub fn identity(&self) -> &FeedIdentity {
        self.view.identity()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.view.snapshot()
    }

    pub fn projection(&self) -> Arc<FeedProjection> {
        self.view.projection()
    }

    pub fn profile(&self) -> Option<Arc<Profile>> {
        self.view.profile()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> FeedSnapshot {
        // The sender lives inside `self.view`, so the channel cannot close here.
        let _ = self.updates.changed().await;
        self.updates.borrow_and_update().clone()
    }
}
