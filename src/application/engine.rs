//! Optimistic patch engine.
//!
//! Turns a mutation intent into a coordinated update of every live view,
//! applied before the backend answers and reconciled or reverted once it does.
//! Each mutation kind has three paths:
//!
//! - **forward**: patch every view that can show the subject, remembering the
//!   delta each view actually received
//! - **reconcile**: on success, correct the views whose optimistic guess
//!   disagrees with the authoritative result
//! - **revert**: on failure, undo exactly what the forward step applied
//!
//! Page fetches go through the same engine so a view's pages are appended in
//! request order and results for dropped or reset views are discarded.

use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::application::backend::{BackendError, FeedBackend};
use crate::application::error::FeedError;
use crate::application::pager::CursorPager;
use crate::application::session::Session;
use crate::cache::{
    CacheConfig, EntityStore, FeedIdentity, FeedStatus, FeedSubscription, LiveView,
    PendingGuard, PendingMutations, ViewHandle, ViewRegistry,
};
use crate::domain::entities::{Profile, Tweet, validate_content};
use crate::domain::error::DomainError;
use crate::domain::types::{FeedScope, MutationKind, TweetId, UserId};

const METRIC_PATCH_APPLIED: &str = "murmur_patch_applied_total";
const METRIC_MUTATION_RECONCILED: &str = "murmur_mutation_reconciled_total";
const METRIC_MUTATION_REVERTED: &str = "murmur_mutation_reverted_total";
const METRIC_FETCH_DISCARDED: &str = "murmur_fetch_discarded_total";

/// Result of a `fetch_more` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was appended; `added` counts tweets not already present.
    Appended { added: usize, has_more: bool },
    /// The last page was terminal; nothing was requested.
    Exhausted,
    /// The view was dropped or reset while the request was in flight.
    Discarded,
}

/// How the local state reached the authoritative result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleResolution {
    /// The optimistic guess matched the server.
    Confirmed,
    /// The guess was wrong and has been corrected.
    Reconciled,
    /// Nothing local held the subject, so the result was applied after the fact.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Server-side end state: liked / following.
    pub added: bool,
    pub resolution: ToggleResolution,
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub tweet: Tweet,
    pub provisional_id: TweetId,
    /// Number of views the provisional tweet was shown in.
    pub prepended_to: usize,
}

/// One view touched by a forward step.
#[derive(Debug, Clone, Copy)]
struct Touched {
    handle: ViewHandle,
    /// Projection generation at patch time; `None` for profile headers,
    /// which survive a refresh.
    generation: Option<u64>,
    before_count: u64,
    before_flag: bool,
    applied: i64,
}

impl Touched {
    /// Delta that moves the forward state onto the authoritative one.
    fn correction(&self, authoritative: i64) -> i64 {
        let target = self.before_count.saturating_add_signed(authoritative);
        let current = self.before_count.saturating_add_signed(self.applied);
        signed_diff(target, current)
    }
}

pub struct FeedEngine {
    registry: Arc<ViewRegistry>,
    store: Arc<EntityStore>,
    pending: Arc<PendingMutations>,
    pager: CursorPager,
    backend: Arc<dyn FeedBackend>,
}

impl FeedEngine {
    pub fn new(backend: Arc<dyn FeedBackend>, config: &CacheConfig) -> Self {
        Self {
            registry: Arc::new(ViewRegistry::new()),
            store: Arc::new(EntityStore::new(config)),
            pending: Arc::new(PendingMutations::new()),
            pager: CursorPager::new(Arc::clone(&backend), config.page_size_non_zero()),
            backend,
        }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn pager(&self) -> &CursorPager {
        &self.pager
    }

    pub fn subscribe(&self, identity: FeedIdentity) -> FeedSubscription {
        self.registry.subscribe(identity)
    }

    pub fn unsubscribe(&self, handle: ViewHandle) -> bool {
        self.registry.unsubscribe(handle)
    }

    /// Whether a control for `(kind, subject)` must be disabled.
    pub fn is_mutation_pending(&self, kind: MutationKind, subject_id: &str) -> bool {
        self.pending.is_pending(kind, subject_id)
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetch the next page of a view and append it.
    ///
    /// Fetches for one view run one at a time. A failure marks the view
    /// `Failed` and leaves its pages untouched; the caller may retry at the
    /// same cursor.
    #[instrument(skip(self, session), fields(view = %handle))]
    pub async fn fetch_more(
        &self,
        session: &Session,
        handle: ViewHandle,
    ) -> Result<FetchOutcome, FeedError> {
        let view = self
            .registry
            .view(handle)
            .ok_or(FeedError::UnknownView(handle))?;
        let _permit = view.fetch_permit().await;

        let generation = view.generation();
        let identity = view.identity().clone();
        let cursor = {
            let projection = view.projection();
            if !projection.is_loaded() {
                None
            } else {
                match projection.next_cursor() {
                    Some(cursor) => Some(cursor.to_string()),
                    None => return Ok(FetchOutcome::Exhausted),
                }
            }
        };
        view.set_status(FeedStatus::Loading);
        // Do not keep the view alive across the request.
        drop(view);

        let result = self.pager.fetch_page(&identity, cursor.as_deref()).await;

        let Some(view) = self.current_view(handle, Some(generation)) else {
            counter!(METRIC_FETCH_DISCARDED, "scope" => identity.scope().as_str()).increment(1);
            debug!(%identity, "Discarding page for a dropped or reset view");
            return Ok(FetchOutcome::Discarded);
        };

        match result {
            Ok(mut page) => {
                if !session.is_authenticated() {
                    page.tweets = page.tweets.into_iter().map(Tweet::anonymized).collect();
                }
                self.store.upsert_all(page.tweets.iter().cloned());

                let mut added = 0;
                let mut has_more = false;
                view.update_projection(|current| {
                    let next = current.append_page(page);
                    added = next.len() - current.len();
                    has_more = next.has_more();
                    Some(next)
                });
                view.set_status(FeedStatus::Idle);
                debug!(%identity, added, has_more, "Page appended");
                Ok(FetchOutcome::Appended { added, has_more })
            }
            Err(err) => {
                let message = match err.backend_cause() {
                    Some(cause) => format!("{err}: {cause}"),
                    None => err.to_string(),
                };
                view.set_status(FeedStatus::Failed { message });
                Err(err)
            }
        }
    }

    /// Drop a view's pages and fetch the first page again.
    #[instrument(skip(self, session), fields(view = %handle))]
    pub async fn refresh(
        &self,
        session: &Session,
        handle: ViewHandle,
    ) -> Result<FetchOutcome, FeedError> {
        let view = self
            .registry
            .view(handle)
            .ok_or(FeedError::UnknownView(handle))?;
        let generation = view.reset();
        debug!(generation, "View reset");
        drop(view);
        self.fetch_more(session, handle).await
    }

    /// Load the profile header of a profile view.
    #[instrument(skip(self), fields(view = %handle))]
    pub async fn load_profile(&self, handle: ViewHandle) -> Result<Profile, FeedError> {
        let view = self
            .registry
            .view(handle)
            .ok_or(FeedError::UnknownView(handle))?;
        let identity = view.identity().clone();
        let Some(user_id) = identity.profile_user_id().cloned() else {
            return Err(DomainError::validation(format!("{identity} is not a profile feed")).into());
        };
        drop(view);

        let profile = self
            .backend
            .get_profile(&user_id)
            .await
            .map_err(|cause| {
                warn!(%identity, error = %cause, "Profile fetch failed");
                FeedError::FetchFailed {
                    identity: identity.clone(),
                    cursor: None,
                    cause,
                }
            })?;

        self.store.upsert_profile(profile.clone());
        if let Some(view) = self.current_view(handle, None) {
            let loaded = profile.clone();
            view.update_profile(move |_| Some(loaded));
        }
        Ok(profile)
    }

    // ========================================================================
    // LIKE_TOGGLE
    // ========================================================================

    #[instrument(skip(self, session), fields(tweet = %tweet_id))]
    pub async fn toggle_like(
        &self,
        session: &Session,
        tweet_id: &TweetId,
    ) -> Result<ToggleOutcome, FeedError> {
        session.require_viewer()?;
        let kind = MutationKind::LikeToggle;
        let guard = self.begin(kind, tweet_id.as_str())?;

        let views = self.registry.live_views();
        let current = views.iter().find_map(|view| {
            view.projection()
                .get(tweet_id)
                .map(|tweet| tweet.liked_by_viewer)
        });

        let Some(liked) = current else {
            drop(views);
            return self.toggle_like_deferred(tweet_id, guard).await;
        };

        let guess = !liked;
        let delta = toggle_delta(guess);
        guard.record_delta(delta);

        let touched = patch_like(&views, tweet_id, delta, guess);
        drop(views);
        let stored = self.store.get(tweet_id);
        if let Some(before) = &stored {
            self.store.upsert(before.with_like_delta(delta, guess));
        }
        counter!(METRIC_PATCH_APPLIED, "kind" => kind.as_str()).increment(touched.len() as u64);
        debug!(views = touched.len(), delta, "Optimistic like applied");

        match self.backend.toggle_like(tweet_id).await {
            Ok(outcome) if outcome.added_like == guess => {
                debug!(added = outcome.added_like, "Like confirmed");
                Ok(ToggleOutcome {
                    added: outcome.added_like,
                    resolution: ToggleResolution::Confirmed,
                })
            }
            Ok(outcome) => {
                let authoritative = toggle_delta(outcome.added_like);
                for entry in &touched {
                    let Some(view) = self.current_view(entry.handle, entry.generation) else {
                        continue;
                    };
                    let correction = entry.correction(authoritative);
                    view.update_projection(|current| {
                        Some(current.patch(tweet_id, |tweet| {
                            tweet.with_like_delta(correction, outcome.added_like)
                        }))
                    });
                }
                if let Some(before) = &stored {
                    self.store
                        .upsert(before.with_like_delta(authoritative, outcome.added_like));
                }
                counter!(METRIC_MUTATION_RECONCILED, "kind" => kind.as_str()).increment(1);
                info!(added = outcome.added_like, guess, "Like reconciled with server");
                Ok(ToggleOutcome {
                    added: outcome.added_like,
                    resolution: ToggleResolution::Reconciled,
                })
            }
            Err(cause) => {
                for entry in &touched {
                    let Some(view) = self.current_view(entry.handle, entry.generation) else {
                        continue;
                    };
                    view.update_projection(|current| {
                        Some(current.patch(tweet_id, |tweet| {
                            tweet.with_like_delta(-entry.applied, entry.before_flag)
                        }))
                    });
                }
                if let Some(before) = stored {
                    self.store.upsert(before);
                }
                Err(self.reverted(kind, tweet_id.as_str(), cause))
            }
        }
    }

    async fn toggle_like_deferred(
        &self,
        tweet_id: &TweetId,
        _guard: PendingGuard,
    ) -> Result<ToggleOutcome, FeedError> {
        let kind = MutationKind::LikeToggle;
        debug!("No live view holds the tweet; deferring like");

        let outcome = self
            .backend
            .toggle_like(tweet_id)
            .await
            .map_err(|cause| self.failed(kind, tweet_id.as_str(), cause))?;

        // Copies fetched during the flight already carry the server state.
        let views = self.registry.live_views();
        let settled = settle_like(&views, tweet_id, outcome.added_like);
        if let Some(tweet) = self.store.settle_like(tweet_id, outcome.added_like) {
            self.store.upsert(tweet);
        }
        counter!(METRIC_PATCH_APPLIED, "kind" => kind.as_str()).increment(settled as u64);
        debug!(views = settled, added = outcome.added_like, "Deferred like applied");
        Ok(ToggleOutcome {
            added: outcome.added_like,
            resolution: ToggleResolution::Deferred,
        })
    }

    // ========================================================================
    // FOLLOW_TOGGLE
    // ========================================================================

    #[instrument(skip(self, session), fields(target = %target))]
    pub async fn toggle_follow(
        &self,
        session: &Session,
        target: &UserId,
    ) -> Result<ToggleOutcome, FeedError> {
        let viewer = session.require_viewer()?;
        if &viewer.id == target {
            return Err(DomainError::validation("cannot follow yourself").into());
        }
        let kind = MutationKind::FollowToggle;
        let guard = self.begin(kind, target.as_str())?;

        let views = self.profile_views(target);
        let current = views
            .iter()
            .find_map(|view| view.profile().map(|profile| profile.is_following));

        let Some(following) = current else {
            drop(views);
            return self.toggle_follow_deferred(target, guard).await;
        };

        let guess = !following;
        let delta = toggle_delta(guess);
        guard.record_delta(delta);

        let touched = patch_follow(&views, delta, guess);
        drop(views);
        let stored = self.store.profile(target);
        if let Some(before) = &stored {
            self.store.upsert_profile(before.with_follow_delta(delta, guess));
        }
        counter!(METRIC_PATCH_APPLIED, "kind" => kind.as_str()).increment(touched.len() as u64);
        debug!(views = touched.len(), delta, "Optimistic follow applied");

        match self.backend.toggle_follow(target).await {
            Ok(outcome) if outcome.added_follow == guess => Ok(ToggleOutcome {
                added: outcome.added_follow,
                resolution: ToggleResolution::Confirmed,
            }),
            Ok(outcome) => {
                let authoritative = toggle_delta(outcome.added_follow);
                for entry in &touched {
                    let Some(view) = self.current_view(entry.handle, entry.generation) else {
                        continue;
                    };
                    let correction = entry.correction(authoritative);
                    view.update_profile(|current| {
                        current.map(|profile| {
                            profile.with_follow_delta(correction, outcome.added_follow)
                        })
                    });
                }
                if let Some(before) = &stored {
                    self.store.upsert_profile(
                        before.with_follow_delta(authoritative, outcome.added_follow),
                    );
                }
                counter!(METRIC_MUTATION_RECONCILED, "kind" => kind.as_str()).increment(1);
                info!(added = outcome.added_follow, guess, "Follow reconciled with server");
                Ok(ToggleOutcome {
                    added: outcome.added_follow,
                    resolution: ToggleResolution::Reconciled,
                })
            }
            Err(cause) => {
                for entry in &touched {
                    let Some(view) = self.current_view(entry.handle, entry.generation) else {
                        continue;
                    };
                    view.update_profile(|current| {
                        current.map(|profile| {
                            profile.with_follow_delta(-entry.applied, entry.before_flag)
                        })
                    });
                }
                if let Some(before) = stored {
                    self.store.upsert_profile(before);
                }
                Err(self.reverted(kind, target.as_str(), cause))
            }
        }
    }

    async fn toggle_follow_deferred(
        &self,
        target: &UserId,
        _guard: PendingGuard,
    ) -> Result<ToggleOutcome, FeedError> {
        let kind = MutationKind::FollowToggle;
        debug!("No live profile view holds the user; deferring follow");

        let outcome = self
            .backend
            .toggle_follow(target)
            .await
            .map_err(|cause| self.failed(kind, target.as_str(), cause))?;

        let added = outcome.added_follow;
        let delta = toggle_delta(added);
        let views = self.profile_views(target);
        let settled = settle_follow(&views, added);
        if let Some(profile) = self
            .store
            .profile(target)
            .filter(|profile| profile.is_following != added)
        {
            self.store.upsert_profile(profile.with_follow_delta(delta, added));
        }
        counter!(METRIC_PATCH_APPLIED, "kind" => kind.as_str()).increment(settled as u64);
        debug!(views = settled, added, "Deferred follow applied");
        Ok(ToggleOutcome {
            added,
            resolution: ToggleResolution::Deferred,
        })
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Post a tweet as the session viewer.
    ///
    /// A provisional copy is shown at the head of the viewer's loaded ALL and
    /// own-profile views right away. On success it is replaced by the server
    /// tweet; on failure it is removed again.
    #[instrument(skip(self, session, content))]
    pub async fn create_tweet(
        &self,
        session: &Session,
        content: &str,
    ) -> Result<CreateOutcome, FeedError> {
        let viewer = session.require_viewer()?;
        let content = validate_content(content)?;
        let kind = MutationKind::Create;
        let guard = self.begin(kind, viewer.id.as_str())?;

        let provisional = Tweet::provisional(viewer, content, OffsetDateTime::now_utc());
        let provisional_id = provisional.id.clone();

        let mut shown = Vec::new();
        let mut headers = Vec::new();
        for view in self.registry.live_views() {
            let identity = view.identity();
            let own_profile = identity.is_profile_of(&viewer.id);
            if identity.scope() != FeedScope::All && !own_profile {
                continue;
            }

            let generation = view.generation();
            let prepended = view.update_projection(|current| {
                if !current.is_loaded() || current.contains(&provisional.id) {
                    return None;
                }
                Some(current.prepend_tweet(provisional.clone()))
            });
            if prepended {
                shown.push((view.handle(), generation));
            }

            if own_profile {
                let mut entry = None;
                view.update_profile(|current| {
                    let profile = current?;
                    let next = profile.with_tweets_delta(1);
                    entry = Some(Touched {
                        handle: view.handle(),
                        generation: None,
                        before_count: profile.tweets_count,
                        before_flag: profile.is_following,
                        applied: signed_diff(next.tweets_count, profile.tweets_count),
                    });
                    Some(next)
                });
                headers.extend(entry);
            }
        }
        guard.record_delta(1);
        self.store.upsert(provisional.clone());
        counter!(METRIC_PATCH_APPLIED, "kind" => kind.as_str()).increment(shown.len() as u64);
        debug!(views = shown.len(), id = %provisional_id, "Provisional tweet shown");

        let result = self.backend.create_tweet(content).await;
        self.store.remove(&provisional_id);
        match result {
            Ok(tweet) => {
                for (handle, generation) in &shown {
                    let Some(view) = self.current_view(*handle, Some(*generation)) else {
                        continue;
                    };
                    view.update_projection(|current| {
                        Some(current.replace_tweet(&provisional_id, tweet.clone()))
                    });
                }
                self.store.upsert(tweet.clone());
                info!(id = %tweet.id, "Tweet created");
                Ok(CreateOutcome {
                    tweet,
                    provisional_id,
                    prepended_to: shown.len(),
                })
            }
            Err(cause) => {
                for (handle, generation) in &shown {
                    let Some(view) = self.current_view(*handle, Some(*generation)) else {
                        continue;
                    };
                    view.update_projection(|current| Some(current.remove_tweet(&provisional_id)));
                }
                for entry in &headers {
                    let Some(view) = self.current_view(entry.handle, entry.generation) else {
                        continue;
                    };
                    view.update_profile(|current| {
                        current.map(|profile| profile.with_tweets_delta(-entry.applied))
                    });
                }
                Err(self.reverted(kind, viewer.id.as_str(), cause))
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn begin(&self, kind: MutationKind, subject: &str) -> Result<PendingGuard, FeedError> {
        self.pending.begin(kind, subject).ok_or_else(|| {
            debug!(%kind, subject, "Mutation already in flight");
            FeedError::MutationInFlight {
                kind,
                subject: subject.to_string(),
            }
        })
    }

    /// The view behind `handle` if it is still live and, for projections,
    /// has not been reset since `generation`.
    fn current_view(&self, handle: ViewHandle, generation: Option<u64>) -> Option<Arc<LiveView>> {
        let view = self.registry.view(handle)?;
        match generation {
            Some(generation) if view.generation() != generation => None,
            _ => Some(view),
        }
    }

    fn profile_views(&self, user_id: &UserId) -> Vec<Arc<LiveView>> {
        self.registry.views_for(&FeedIdentity::profile(user_id.clone()))
    }

    fn failed(
        &self,
        kind: MutationKind,
        subject: &str,
        cause: BackendError,
    ) -> FeedError {
        warn!(%kind, subject, error = %cause, "Mutation failed");
        FeedError::MutationFailed {
            kind,
            subject: subject.to_string(),
            cause,
        }
    }

    fn reverted(
        &self,
        kind: MutationKind,
        subject: &str,
        cause: BackendError,
    ) -> FeedError {
        counter!(METRIC_MUTATION_REVERTED, "kind" => kind.as_str()).increment(1);
        info!(%kind, subject, "Optimistic update reverted");
        self.failed(kind, subject, cause)
    }
}

fn toggle_delta(added: bool) -> i64 {
    if added { 1 } else { -1 }
}

fn signed_diff(after: u64, before: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |diff| -diff)
    }
}

/// Apply a like delta to every view holding `tweet_id`.
fn patch_like(views: &[Arc<LiveView>], tweet_id: &TweetId, delta: i64, liked: bool) -> Vec<Touched> {
    let mut touched = Vec::new();
    for view in views {
        let generation = view.generation();
        let mut entry = None;
        view.update_projection(|current| {
            let before = current.get(tweet_id)?;
            let after = before.with_like_delta(delta, liked);
            entry = Some(Touched {
                handle: view.handle(),
                generation: Some(generation),
                before_count: before.like_count,
                before_flag: before.liked_by_viewer,
                applied: signed_diff(after.like_count, before.like_count),
            });
            Some(current.patch(tweet_id, |_| after))
        });
        touched.extend(entry);
    }
    touched
}

/// Move every copy of `tweet_id` whose flag differs onto the server state.
///
/// Returns the number of views patched.
fn settle_like(views: &[Arc<LiveView>], tweet_id: &TweetId, liked: bool) -> usize {
    let mut settled = 0;
    for view in views {
        let patched = view.update_projection(|current| {
            let before = current.get(tweet_id)?;
            if before.liked_by_viewer == liked {
                return None;
            }
            let after = before.with_like_delta(toggle_delta(liked), liked);
            Some(current.patch(tweet_id, |_| after))
        });
        settled += usize::from(patched);
    }
    settled
}

fn settle_follow(views: &[Arc<LiveView>], following: bool) -> usize {
    let mut settled = 0;
    for view in views {
        let patched = view.update_profile(|current| {
            let before = current.filter(|profile| profile.is_following != following)?;
            Some(before.with_follow_delta(toggle_delta(following), following))
        });
        settled += usize::from(patched);
    }
    settled
}

/// Apply a follow delta to every loaded profile header in `views`.
fn patch_follow(views: &[Arc<LiveView>], delta: i64, following: bool) -> Vec<Touched> {
    let mut touched = Vec::new();
    for view in views {
        let mut entry = None;
        view.update_profile(|current| {
            let before = current?;
            let after = before.with_follow_delta(delta, following);
            entry = Some(Touched {
                handle: view.handle(),
                generation: None,
                before_count: before.followers_count,
                before_flag: before.is_following,
                applied: signed_diff(after.followers_count, before.followers_count),
            });
            Some(after)
        });
        touched.extend(entry);
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_diff_handles_both_directions() {
        assert_eq!(signed_diff(4, 3), 1);
        assert_eq!(signed_diff(3, 4), -1);
        assert_eq!(signed_diff(0, 0), 0);
    }

    #[test]
    fn correction_accounts_for_clamping() {
        // Count 0, optimistic unlike clamped to no change, server says liked.
        let entry = Touched {
            handle: ViewHandle::new(1),
            generation: Some(0),
            before_count: 0,
            before_flag: true,
            applied: 0,
        };
        assert_eq!(entry.correction(1), 1);
        assert_eq!(entry.correction(-1), 0);

        let entry = Touched {
            before_count: 3,
            applied: 1,
            ..entry
        };
        assert_eq!(entry.correction(-1), -2);
        assert_eq!(entry.correction(1), 0);
    }
}
