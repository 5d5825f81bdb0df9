//! View registry.
//!
//! Directory of live views keyed by handle and by feed identity, used by the
//! patch engine to fan a mutation out to every projection that may hold the
//! affected entity. The registry never owns a view: it stores weak references
//! and the subscribing view decides the lifetime.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use metrics::gauge;
use tracing::{debug, info};

use super::keys::{FeedIdentity, ViewHandle};
use super::lock::{rw_read, rw_write};
use super::view::{FeedSubscription, LiveView};

const SOURCE: &str = "cache::registry";
const METRIC_LIVE_VIEWS: &str = "murmur_live_views";

/// Tracks handle → view and identity → handles mappings.
pub struct ViewRegistry {
    next_handle: AtomicU64,
    /// Ordered so fan-out visits views in subscription order.
    views: RwLock<BTreeMap<ViewHandle, Weak<LiveView>>>,
    by_identity: RwLock<HashMap<FeedIdentity, HashSet<ViewHandle>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            views: RwLock::new(BTreeMap::new()),
            by_identity: RwLock::new(HashMap::new()),
        }
    }

    /// Create a projection for `identity` and register it as live.
    pub fn subscribe(&self, identity: FeedIdentity) -> FeedSubscription {
        let handle = ViewHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let view = Arc::new(LiveView::new(handle, identity.clone()));

        {
            let mut views = rw_write(&self.views, SOURCE, "subscribe.views");
            let mut by_identity = rw_write(&self.by_identity, SOURCE, "subscribe.by_identity");
            views.insert(handle, Arc::downgrade(&view));
            by_identity.entry(identity.clone()).or_default().insert(handle);
            gauge!(METRIC_LIVE_VIEWS).set(views.len() as f64);
        }

        info!(%handle, %identity, "Feed view subscribed");
        FeedSubscription::new(view)
    }

    /// Remove a view from the directory. Returns false if it was not live.
    pub fn unsubscribe(&self, handle: ViewHandle) -> bool {
        let mut views = rw_write(&self.views, SOURCE, "unsubscribe.views");
        let mut by_identity = rw_write(&self.by_identity, SOURCE, "unsubscribe.by_identity");

        let Some(weak) = views.remove(&handle) else {
            return false;
        };
        gauge!(METRIC_LIVE_VIEWS).set(views.len() as f64);

        let identity = weak.upgrade().map(|view| view.identity().clone());
        match identity {
            Some(identity) => {
                remove_from_index(&mut by_identity, &identity, handle);
                info!(%handle, %identity, "Feed view unsubscribed");
            }
            None => {
                by_identity.retain(|_, handles| {
                    handles.remove(&handle);
                    !handles.is_empty()
                });
                info!(%handle, "Feed view unsubscribed after drop");
            }
        }
        true
    }

    /// Resolve a live view; `None` once unsubscribed or dropped.
    pub fn view(&self, handle: ViewHandle) -> Option<Arc<LiveView>> {
        rw_read(&self.views, SOURCE, "view")
            .get(&handle)
            .and_then(Weak::upgrade)
    }

    pub fn is_live(&self, handle: ViewHandle) -> bool {
        self.view(handle).is_some()
    }

    /// Every live view, in subscription order. Dropped views are pruned.
    pub fn live_views(&self) -> Vec<Arc<LiveView>> {
        let (live, dead) = {
            let views = rw_read(&self.views, SOURCE, "live_views");
            let mut live = Vec::with_capacity(views.len());
            let mut dead = Vec::new();
            for (handle, weak) in views.iter() {
                match weak.upgrade() {
                    Some(view) => live.push(view),
                    None => dead.push(*handle),
                }
            }
            (live, dead)
        };

        if !dead.is_empty() {
            debug!(pruned = dead.len(), "Pruning dropped feed views");
            for handle in dead {
                self.unsubscribe(handle);
            }
        }
        live
    }

    /// Live views whose identity equals `identity`.
    pub fn views_for(&self, identity: &FeedIdentity) -> Vec<Arc<LiveView>> {
        let handles: Vec<ViewHandle> = rw_read(&self.by_identity, SOURCE, "views_for")
            .get(identity)
            .map(|handles| handles.iter().copied().collect())
            .unwrap_or_default();

        let mut views: Vec<Arc<LiveView>> = handles
            .into_iter()
            .filter_map(|handle| self.view(handle))
            .collect();
        views.sort_by_key(|view| view.handle());
        views
    }

    /// Number of registered views, including dropped ones not yet pruned.
    pub fn view_count(&self) -> usize {
        rw_read(&self.views, SOURCE, "view_count").len()
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_from_index(
    by_identity: &mut HashMap<FeedIdentity, HashSet<ViewHandle>>,
    identity: &FeedIdentity,
    handle: ViewHandle,
) {
    if let Some(handles) = by_identity.get_mut(identity) {
        handles.remove(&handle);
        if handles.is_empty() {
            by_identity.remove(identity);
        }
    }
}
