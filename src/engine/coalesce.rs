/// Action coalescer
///
/// Bounds the network traffic generated by bursts of identical user
/// actions (double-click favourite, vote flip-flop): at most one remote
/// mutation is issued per window per logical action, while the
/// reflected cache updates synchronously on every submit so the
/// interface never feels unresponsive.
///
/// Two policies, selectable by configuration:
/// - Throttle: the first submit per key fires immediately, later ones
///   inside the window are suppressed (speculative state only).
/// - Debounce: nothing fires until the window elapses with no further
///   submits; the latest action of the burst is the one that fires.
use crate::engine::coordinator::{Action, MutationCoordinator, MutationReceipt, Snapshot};
use crate::error::GalleryResult;
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota,
    RateLimiter as GovernorLimiter,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Coalescing policy for burst actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoalescePolicy {
    Debounce,
    Throttle,
}

/// Logical action families that share one coalescing window. Favourite
/// and unfavourite form a single toggle, matching the single throttled
/// toggle handler in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActionKind {
    Vote,
    RemoveVote,
    FavouriteToggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ActionKey {
    user_id: String,
    image_id: String,
    kind: ActionKind,
}

impl ActionKey {
    fn of(action: &Action) -> Self {
        let kind = match action {
            Action::Vote { .. } => ActionKind::Vote,
            Action::RemoveVote { .. } => ActionKind::RemoveVote,
            Action::Favourite { .. } | Action::Unfavourite { .. } => ActionKind::FavouriteToggle,
        };
        ActionKey {
            user_id: action.user_id().to_string(),
            image_id: action.image_id().to_string(),
            kind,
        }
    }
}

/// How a submitted action was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Fired and settled; carries the remote receipt
    Applied(MutationReceipt),
    /// Suppressed by the throttle window; speculative state only
    Coalesced,
    /// Armed behind a debounce timer; settles after the quiet window
    Scheduled,
}

struct DebounceSlot {
    /// Pre-burst snapshot, kept for rollback of the eventual fire
    snapshot: Snapshot,
    /// Latest action of the burst; the one that fires
    action: Action,
    /// Bumped on every re-arm; a timer only fires the slot it armed
    epoch: u64,
    timer: JoinHandle<()>,
}

struct CoalescerInner {
    window: Duration,
    coordinator: Arc<MutationCoordinator>,
    throttle: GovernorLimiter<ActionKey, DefaultKeyedStateStore<ActionKey>, DefaultClock>,
    debounce: Mutex<HashMap<ActionKey, DebounceSlot>>,
}

pub struct ActionCoalescer {
    policy: CoalescePolicy,
    inner: Arc<CoalescerInner>,
}

impl ActionCoalescer {
    pub fn new(
        policy: CoalescePolicy,
        window: Duration,
        coordinator: Arc<MutationCoordinator>,
    ) -> Self {
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::with_period(Duration::from_millis(275)).unwrap())
            .allow_burst(NonZeroU32::new(1).unwrap());
        Self {
            policy,
            inner: Arc::new(CoalescerInner {
                window,
                coordinator,
                throttle: GovernorLimiter::keyed(quota),
                debounce: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    /// Submit a user action. The reflected cache updates before this
    /// returns; whether the network mutation fires now, later, or not
    /// at all is reported through the `Dispatch`.
    pub async fn submit(&self, action: Action) -> GalleryResult<Dispatch> {
        match self.policy {
            CoalescePolicy::Throttle => self.submit_throttled(action).await,
            CoalescePolicy::Debounce => Ok(self.submit_debounced(action)),
        }
    }

    async fn submit_throttled(&self, action: Action) -> GalleryResult<Dispatch> {
        let key = ActionKey::of(&action);
        if self.inner.throttle.check_key(&key).is_ok() {
            let receipt = self.inner.coordinator.apply(action).await?;
            return Ok(Dispatch::Applied(receipt));
        }

        // Suppressed: the click must still be visible. A repeat of an
        // identical action is already reflected and collapses to a
        // no-op; a changed action (vote flip) re-speculates.
        if !self.inner.coordinator.is_reflected(&action) {
            self.inner.coordinator.reflect(&action);
        }
        debug!(
            user_id = action.user_id(),
            image_id = action.image_id(),
            "mutation suppressed by throttle window"
        );
        Ok(Dispatch::Coalesced)
    }

    fn submit_debounced(&self, action: Action) -> Dispatch {
        let key = ActionKey::of(&action);
        let mut slots = self.inner.debounce.lock();
        match slots.get_mut(&key) {
            Some(slot) => {
                // Re-arm: the newest action wins, the pre-burst
                // snapshot is kept for rollback.
                slot.timer.abort();
                if !self.inner.coordinator.is_reflected(&action) {
                    self.inner.coordinator.reflect(&action);
                }
                slot.action = action;
                slot.epoch += 1;
                slot.timer = arm(Arc::clone(&self.inner), key, slot.epoch);
            }
            None => {
                let snapshot = self.inner.coordinator.reflect(&action);
                let timer = arm(Arc::clone(&self.inner), key.clone(), 0);
                slots.insert(
                    key,
                    DebounceSlot {
                        snapshot,
                        action,
                        epoch: 0,
                        timer,
                    },
                );
            }
        }
        Dispatch::Scheduled
    }
}

/// Arm the quiet-window timer for a debounce slot. The epoch check
/// makes firing safe even if the abort of a superseded timer lands
/// after its sleep already returned.
fn arm(inner: Arc<CoalescerInner>, key: ActionKey, epoch: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(inner.window).await;
        let slot = {
            let mut slots = inner.debounce.lock();
            let armed_here = slots
                .get(&key)
                .map(|slot| slot.epoch == epoch)
                .unwrap_or(false);
            if armed_here {
                slots.remove(&key)
            } else {
                None
            }
        };
        let Some(slot) = slot else {
            return;
        };
        debug!(
            user_id = %key.user_id,
            image_id = %key.image_id,
            "debounce window elapsed, settling mutation"
        );
        if let Err(err) = inner.coordinator.settle(slot.action, slot.snapshot).await {
            warn!(
                user_id = %key.user_id,
                image_id = %key.image_id,
                error = %err,
                "debounced mutation failed and was rolled back"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::coordinator::RemoteStore;
    use crate::engine::{Favourite, Vote, VoteValue};
    use crate::error::GalleryError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRemote {
        server_votes: Mutex<Vec<Vote>>,
        server_favourites: Mutex<Vec<Favourite>>,
        next_id: AtomicI64,
        fail: AtomicBool,
        vote_calls: AtomicUsize,
        favourite_calls: AtomicUsize,
        last_vote_value: Mutex<Option<VoteValue>>,
    }

    impl CountingRemote {
        fn transport() -> GalleryError {
            GalleryError::Transport {
                status: 500,
                message: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for CountingRemote {
        async fn submit_vote(
            &self,
            image_id: &str,
            user_id: &str,
            value: VoteValue,
        ) -> GalleryResult<i64> {
            self.vote_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_vote_value.lock() = Some(value);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Self::transport());
            }
            let mut votes = self.server_votes.lock();
            if let Some(existing) = votes.iter_mut().find(|vote| vote.image_id == image_id) {
                existing.value = value;
                return Ok(existing.id);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            votes.push(Vote {
                id,
                image_id: image_id.to_string(),
                value,
                user_id: user_id.to_string(),
            });
            Ok(id)
        }

        async fn delete_vote(&self, image_id: &str, _user_id: &str) -> GalleryResult<i64> {
            let mut votes = self.server_votes.lock();
            let Some(position) = votes.iter().position(|vote| vote.image_id == image_id) else {
                return Err(GalleryError::VoteNotFound);
            };
            Ok(votes.remove(position).id)
        }

        async fn submit_favourite(&self, image_id: &str, _user_id: &str) -> GalleryResult<i64> {
            self.favourite_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Self::transport());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.server_favourites.lock().push(Favourite {
                id,
                image_id: image_id.to_string(),
            });
            Ok(id)
        }

        async fn delete_favourite(&self, favourite_id: i64) -> GalleryResult<i64> {
            self.server_favourites
                .lock()
                .retain(|favourite| favourite.id != favourite_id);
            Ok(favourite_id)
        }

        async fn list_votes(&self, _user_id: &str) -> GalleryResult<Vec<Vote>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Self::transport());
            }
            Ok(self.server_votes.lock().clone())
        }

        async fn list_favourites(&self, _user_id: &str) -> GalleryResult<Vec<Favourite>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Self::transport());
            }
            Ok(self.server_favourites.lock().clone())
        }
    }

    fn setup(
        policy: CoalescePolicy,
        window_ms: u64,
    ) -> (Arc<CountingRemote>, ActionCoalescer, Arc<MutationCoordinator>) {
        let remote = Arc::new(CountingRemote {
            next_id: AtomicI64::new(1),
            ..CountingRemote::default()
        });
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>
        ));
        let coalescer = ActionCoalescer::new(
            policy,
            Duration::from_millis(window_ms),
            Arc::clone(&coordinator),
        );
        (remote, coalescer, coordinator)
    }

    fn vote(image_id: &str, value: VoteValue) -> Action {
        Action::Vote {
            user_id: "user1".to_string(),
            image_id: image_id.to_string(),
            value,
        }
    }

    fn favourite(image_id: &str) -> Action {
        Action::Favourite {
            user_id: "user1".to_string(),
            image_id: image_id.to_string(),
        }
    }

    // P2: M submits of the coalesced favourite toggle inside one window
    // issue exactly one network mutation.
    #[tokio::test]
    async fn test_throttle_issues_one_mutation_per_window() {
        let (remote, coalescer, coordinator) = setup(CoalescePolicy::Throttle, 275);

        let first = coalescer.submit(favourite("img1")).await.unwrap();
        assert!(matches!(first, Dispatch::Applied(_)));
        for _ in 0..4 {
            let dispatch = coalescer.submit(favourite("img1")).await.unwrap();
            assert_eq!(dispatch, Dispatch::Coalesced);
        }

        assert_eq!(remote.favourite_calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.cached_favourites("user1").len(), 1);
    }

    // The suppressed click is still visible: a vote flip inside the
    // window updates the reflected cache without a second network call.
    #[tokio::test]
    async fn test_suppressed_submit_still_updates_state() {
        let (remote, coalescer, coordinator) = setup(CoalescePolicy::Throttle, 275);

        coalescer.submit(vote("img1", VoteValue::Up)).await.unwrap();
        assert_eq!(
            coordinator.cached_votes("user1")[0].value,
            VoteValue::Up
        );

        let dispatch = coalescer
            .submit(vote("img1", VoteValue::Down))
            .await
            .unwrap();
        assert_eq!(dispatch, Dispatch::Coalesced);
        assert_eq!(
            coordinator.cached_votes("user1")[0].value,
            VoteValue::Down
        );
        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 1);
    }

    // After the window elapses the next submit is admitted again.
    #[tokio::test]
    async fn test_throttle_admits_again_after_window() {
        let (remote, coalescer, _) = setup(CoalescePolicy::Throttle, 50);

        let first = coalescer.submit(vote("img1", VoteValue::Up)).await.unwrap();
        assert!(matches!(first, Dispatch::Applied(_)));
        let second = coalescer
            .submit(vote("img1", VoteValue::Down))
            .await
            .unwrap();
        assert_eq!(second, Dispatch::Coalesced);

        tokio::time::sleep(Duration::from_millis(120)).await;

        let third = coalescer
            .submit(vote("img1", VoteValue::Down))
            .await
            .unwrap();
        assert!(matches!(third, Dispatch::Applied(_)));
        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 2);
    }

    // Actions on different images coalesce independently.
    #[tokio::test]
    async fn test_throttle_keys_are_per_image() {
        let (remote, coalescer, _) = setup(CoalescePolicy::Throttle, 275);

        let first = coalescer.submit(vote("img1", VoteValue::Up)).await.unwrap();
        let second = coalescer.submit(vote("img2", VoteValue::Up)).await.unwrap();
        assert!(matches!(first, Dispatch::Applied(_)));
        assert!(matches!(second, Dispatch::Applied(_)));
        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 2);
    }

    // Debounce: nothing fires until the window elapses quietly, and the
    // latest action of the burst is the one that fires.
    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_latest_action_after_quiet_window() {
        let (remote, coalescer, coordinator) = setup(CoalescePolicy::Debounce, 275);

        let first = coalescer.submit(vote("img1", VoteValue::Up)).await.unwrap();
        assert_eq!(first, Dispatch::Scheduled);
        assert_eq!(
            coordinator.cached_votes("user1")[0].value,
            VoteValue::Up
        );

        tokio::time::advance(Duration::from_millis(100)).await;
        let second = coalescer
            .submit(vote("img1", VoteValue::Down))
            .await
            .unwrap();
        assert_eq!(second, Dispatch::Scheduled);
        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(300)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*remote.last_vote_value.lock(), Some(VoteValue::Down));
        let settled = coordinator.cached_votes("user1");
        assert_eq!(settled.len(), 1);
        assert!(!settled[0].is_pending());
    }

    // Debounce failure restores the pre-burst snapshot.
    #[tokio::test(start_paused = true)]
    async fn test_debounce_failure_restores_pre_burst_state() {
        let (remote, coalescer, coordinator) = setup(CoalescePolicy::Debounce, 275);
        remote.fail.store(true, Ordering::SeqCst);

        coalescer.submit(vote("img1", VoteValue::Up)).await.unwrap();
        assert_eq!(coordinator.cached_votes("user1").len(), 1);

        tokio::time::advance(Duration::from_millis(300)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(remote.vote_calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.cached_votes("user1").is_empty());
    }
}
