/// Optimistic mutation coordinator
///
/// Wraps every write operation (vote, remove-vote, favourite,
/// unfavourite) in a uniform five-phase protocol:
///
/// 1. cancel in-flight refetches for the affected user,
/// 2. snapshot the current list,
/// 3. write the speculative list,
/// 4. invoke the remote adapter,
/// 5. settle: roll back to the snapshot on failure, then refetch the
///    list from the remote so the cache reconciles with server truth
///    (temporary ids are replaced by real ones here).
///
/// Phases 1-3 run under a single cache lock with no await point.
/// Mutations for the same (user, domain, image) stream are serialized
/// by a keyed async mutex so speculative writes and their rollbacks are
/// never reordered within a stream.
use crate::engine::cache::ReflectedCache;
use crate::engine::{Favourite, Vote, VoteValue, TEMP_ID};
use crate::error::GalleryResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Seam between the engine and the remote vote/favourite API. Errors
/// are tagged outcomes (`Transport`, `VoteNotFound`,
/// `AlreadyFavourited`), never panics, and are not retried here.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn submit_vote(
        &self,
        image_id: &str,
        user_id: &str,
        value: VoteValue,
    ) -> GalleryResult<i64>;

    async fn delete_vote(&self, image_id: &str, user_id: &str) -> GalleryResult<i64>;

    async fn submit_favourite(&self, image_id: &str, user_id: &str) -> GalleryResult<i64>;

    async fn delete_favourite(&self, favourite_id: i64) -> GalleryResult<i64>;

    async fn list_votes(&self, user_id: &str) -> GalleryResult<Vec<Vote>>;

    async fn list_favourites(&self, user_id: &str) -> GalleryResult<Vec<Favourite>>;
}

/// One user-triggered write operation
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Vote {
        user_id: String,
        image_id: String,
        value: VoteValue,
    },
    RemoveVote {
        user_id: String,
        image_id: String,
    },
    Favourite {
        user_id: String,
        image_id: String,
    },
    Unfavourite {
        user_id: String,
        image_id: String,
        favourite_id: i64,
    },
}

/// Which cached list an action touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Votes,
    Favourites,
}

impl Action {
    pub fn user_id(&self) -> &str {
        match self {
            Action::Vote { user_id, .. }
            | Action::RemoveVote { user_id, .. }
            | Action::Favourite { user_id, .. }
            | Action::Unfavourite { user_id, .. } => user_id,
        }
    }

    pub fn image_id(&self) -> &str {
        match self {
            Action::Vote { image_id, .. }
            | Action::RemoveVote { image_id, .. }
            | Action::Favourite { image_id, .. }
            | Action::Unfavourite { image_id, .. } => image_id,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Action::Vote { .. } | Action::RemoveVote { .. } => Domain::Votes,
            Action::Favourite { .. } | Action::Unfavourite { .. } => Domain::Favourites,
        }
    }
}

/// Pre-mutation copy of the affected list, held until settlement and
/// used only for rollback.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Votes(Vec<Vote>),
    Favourites(Vec<Favourite>),
}

/// Outcome of a settled mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationReceipt {
    pub remote_id: i64,
}

type StreamKey = (String, Domain, String);

pub struct MutationCoordinator {
    remote: Arc<dyn RemoteStore>,
    votes: ReflectedCache<Vote>,
    favourites: ReflectedCache<Favourite>,
    streams: Mutex<HashMap<StreamKey, Arc<AsyncMutex<()>>>>,
}

impl MutationCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            votes: ReflectedCache::new(),
            favourites: ReflectedCache::new(),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Current reflected vote list for a user
    pub fn cached_votes(&self, user_id: &str) -> Vec<Vote> {
        self.votes.get(user_id)
    }

    /// Current reflected favourite list for a user
    pub fn cached_favourites(&self, user_id: &str) -> Vec<Favourite> {
        self.favourites.get(user_id)
    }

    /// Full protocol: serialize on the stream, then phases 1-5.
    pub async fn apply(&self, action: Action) -> GalleryResult<MutationReceipt> {
        let stream = self.stream(&action);
        let _ordering = stream.lock().await;
        let snapshot = self.reflect(&action);
        self.run_settle(action, snapshot).await
    }

    /// Phases 1-3: cancel pending refetches, snapshot, write the
    /// speculative list. Synchronous; no await point. Returns the
    /// snapshot the caller must hand back to `settle`.
    pub fn reflect(&self, action: &Action) -> Snapshot {
        let user_id = action.user_id();
        debug!(
            user_id,
            image_id = action.image_id(),
            "applying speculative write"
        );
        match action {
            Action::Vote {
                image_id, value, ..
            } => {
                let owner = user_id.to_string();
                let previous = self.votes.mutate(user_id, |entries| {
                    let mut updated = entries.to_vec();
                    match updated.iter_mut().find(|vote| vote.image_id == *image_id) {
                        // Replace in place: list order and id are kept.
                        Some(existing) => existing.value = *value,
                        None => updated.push(Vote {
                            id: TEMP_ID,
                            image_id: image_id.clone(),
                            value: *value,
                            user_id: owner,
                        }),
                    }
                    updated
                });
                Snapshot::Votes(previous)
            }
            Action::RemoveVote { image_id, .. } => {
                let previous = self.votes.mutate(user_id, |entries| {
                    entries
                        .iter()
                        .filter(|vote| vote.image_id != *image_id)
                        .cloned()
                        .collect()
                });
                Snapshot::Votes(previous)
            }
            Action::Favourite { image_id, .. } => {
                // Duplicate risk accepted transiently; refetch reconciles.
                let previous = self.favourites.mutate(user_id, |entries| {
                    let mut updated = entries.to_vec();
                    updated.push(Favourite {
                        id: TEMP_ID,
                        image_id: image_id.clone(),
                    });
                    updated
                });
                Snapshot::Favourites(previous)
            }
            Action::Unfavourite { favourite_id, .. } => {
                let previous = self.favourites.mutate(user_id, |entries| {
                    entries
                        .iter()
                        .filter(|favourite| favourite.id != *favourite_id)
                        .cloned()
                        .collect()
                });
                Snapshot::Favourites(previous)
            }
        }
    }

    /// True when the reflected cache already shows the action's
    /// intended outcome. Suppressed repeats of an identical action use
    /// this to collapse into the speculative state already visible,
    /// instead of stacking another speculative write.
    pub fn is_reflected(&self, action: &Action) -> bool {
        match action {
            Action::Vote {
                user_id,
                image_id,
                value,
            } => self
                .votes
                .get(user_id)
                .iter()
                .any(|vote| vote.image_id == *image_id && vote.value == *value),
            Action::RemoveVote { user_id, image_id } => !self
                .votes
                .get(user_id)
                .iter()
                .any(|vote| vote.image_id == *image_id),
            Action::Favourite { user_id, image_id } => self
                .favourites
                .get(user_id)
                .iter()
                .any(|favourite| favourite.image_id == *image_id),
            Action::Unfavourite {
                user_id,
                favourite_id,
                ..
            } => !self
                .favourites
                .get(user_id)
                .iter()
                .any(|favourite| favourite.id == *favourite_id),
        }
    }

    /// Phases 4-5 for a mutation whose speculative write already
    /// happened (the debounced path). Serializes on the stream.
    pub async fn settle(&self, action: Action, snapshot: Snapshot) -> GalleryResult<MutationReceipt> {
        let stream = self.stream(&action);
        let _ordering = stream.lock().await;
        self.run_settle(action, snapshot).await
    }

    /// Refetch the vote list from the remote and reconcile the cache
    /// under the generation guard. Returns the now-current list.
    pub async fn refresh_votes(&self, user_id: &str) -> GalleryResult<Vec<Vote>> {
        let ticket = self.votes.begin_refetch(user_id);
        let fresh = self.remote.list_votes(user_id).await?;
        if !self.votes.complete_refetch(user_id, ticket, fresh) {
            debug!(user_id, "vote refetch superseded by a newer write");
        }
        Ok(self.votes.get(user_id))
    }

    /// Refetch the favourite list from the remote and reconcile.
    pub async fn refresh_favourites(&self, user_id: &str) -> GalleryResult<Vec<Favourite>> {
        let ticket = self.favourites.begin_refetch(user_id);
        let fresh = self.remote.list_favourites(user_id).await?;
        if !self.favourites.complete_refetch(user_id, ticket, fresh) {
            debug!(user_id, "favourite refetch superseded by a newer write");
        }
        Ok(self.favourites.get(user_id))
    }

    async fn run_settle(
        &self,
        action: Action,
        snapshot: Snapshot,
    ) -> GalleryResult<MutationReceipt> {
        let user_id = action.user_id().to_string();
        let outcome = self.invoke(&action).await;

        if let Err(err) = &outcome {
            warn!(
                user_id = %user_id,
                image_id = %action.image_id(),
                error = %err,
                "mutation failed, rolling back speculative write"
            );
            self.restore(&user_id, snapshot);
        }

        // Reconcile with server truth regardless of the outcome; the
        // refetch is the ultimate source of truth and swaps temporary
        // ids for remote-assigned ones.
        let refetched = match action.domain() {
            Domain::Votes => self.refresh_votes(&user_id).await.map(|_| ()),
            Domain::Favourites => self.refresh_favourites(&user_id).await.map(|_| ()),
        };
        if let Err(err) = refetched {
            warn!(user_id = %user_id, error = %err, "post-settle refetch failed");
        }

        outcome.map(|remote_id| MutationReceipt { remote_id })
    }

    async fn invoke(&self, action: &Action) -> GalleryResult<i64> {
        match action {
            Action::Vote {
                user_id,
                image_id,
                value,
            } => self.remote.submit_vote(image_id, user_id, *value).await,
            Action::RemoveVote { user_id, image_id } => {
                self.remote.delete_vote(image_id, user_id).await
            }
            Action::Favourite { user_id, image_id } => {
                self.remote.submit_favourite(image_id, user_id).await
            }
            Action::Unfavourite { favourite_id, .. } => {
                self.remote.delete_favourite(*favourite_id).await
            }
        }
    }

    fn restore(&self, user_id: &str, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Votes(previous) => self.votes.set(user_id, previous),
            Snapshot::Favourites(previous) => self.favourites.set(user_id, previous),
        }
    }

    fn stream(&self, action: &Action) -> Arc<AsyncMutex<()>> {
        let key = (
            action.user_id().to_string(),
            action.domain(),
            action.image_id().to_string(),
        );
        let mut streams = self.streams.lock();
        streams
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
