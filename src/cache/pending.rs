//! Ledger of mutations awaiting their authoritative response.
//!
//! At most one mutation per (kind, subject) is in flight. A second toggle on
//! the same subject is rejected until the first resolves, which keeps delta
//! application in request order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::domain::types::MutationKind;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::pending";

type PendingKey = (MutationKind, String);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub subject_id: String,
    /// Delta applied optimistically, `None` while deferred.
    pub speculative_delta: Option<i64>,
    pub started_at: Instant,
}

#[derive(Default)]
pub struct PendingMutations {
    inflight: Mutex<HashMap<PendingKey, PendingMutation>>,
}

impl PendingMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (kind, subject) slot; `None` if a mutation is already in flight.
    pub fn begin(self: &Arc<Self>, kind: MutationKind, subject_id: &str) -> Option<PendingGuard> {
        let key = (kind, subject_id.to_string());
        let mut inflight = mutex_lock(&self.inflight, SOURCE, "begin");
        if inflight.contains_key(&key) {
            return None;
        }
        inflight.insert(
            key.clone(),
            PendingMutation {
                kind,
                subject_id: subject_id.to_string(),
                speculative_delta: None,
                started_at: Instant::now(),
            },
        );
        Some(PendingGuard {
            ledger: Arc::clone(self),
            key,
        })
    }

    /// Whether controls for this subject should be disabled.
    pub fn is_pending(&self, kind: MutationKind, subject_id: &str) -> bool {
        mutex_lock(&self.inflight, SOURCE, "is_pending")
            .contains_key(&(kind, subject_id.to_string()))
    }

    pub fn get(&self, kind: MutationKind, subject_id: &str) -> Option<PendingMutation> {
        mutex_lock(&self.inflight, SOURCE, "get")
            .get(&(kind, subject_id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.inflight, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the in-flight slot on drop, whatever the outcome.
pub struct PendingGuard {
    ledger: Arc<PendingMutations>,
    key: PendingKey,
}

impl PendingGuard {
    pub fn record_delta(&self, delta: i64) {
        if let Some(entry) =
            mutex_lock(&self.ledger.inflight, SOURCE, "record_delta").get_mut(&self.key)
        {
            entry.speculative_delta = Some(delta);
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        mutex_lock(&self.ledger.inflight, SOURCE, "release").remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_on_same_subject_is_rejected() {
        let ledger = Arc::new(PendingMutations::new());

        let guard = ledger.begin(MutationKind::LikeToggle, "t1");
        assert!(guard.is_some());
        assert!(ledger.begin(MutationKind::LikeToggle, "t1").is_none());
        assert!(ledger.is_pending(MutationKind::LikeToggle, "t1"));

        // Different kind or subject is independent.
        assert!(ledger.begin(MutationKind::FollowToggle, "t1").is_some());
        assert!(ledger.begin(MutationKind::LikeToggle, "t2").is_some());
    }

    #[test]
    fn dropping_the_guard_releases_the_slot() {
        let ledger = Arc::new(PendingMutations::new());

        let guard = ledger.begin(MutationKind::Create, "u1").expect("slot free");
        drop(guard);

        assert!(!ledger.is_pending(MutationKind::Create, "u1"));
        assert!(ledger.is_empty());
        assert!(ledger.begin(MutationKind::Create, "u1").is_some());
    }

    #[test]
    fn recorded_delta_is_visible() {
        let ledger = Arc::new(PendingMutations::new());
        let guard = ledger.begin(MutationKind::LikeToggle, "t1").expect("slot free");

        assert_eq!(
            ledger
                .get(MutationKind::LikeToggle, "t1")
                .expect("pending")
                .speculative_delta,
            None
        );
        guard.record_delta(1);
        assert_eq!(
            ledger
                .get(MutationKind::LikeToggle, "t1")
                .expect("pending")
                .speculative_delta,
            Some(1)
        );
    }
}
