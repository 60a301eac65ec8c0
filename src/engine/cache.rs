/// Local reflected cache
///
/// Keyed, in-memory store of the last-known vote or favourite list per
/// user. The list is only ever replaced as a whole, which keeps the
/// coordinator's rollback contract a single list swap. A per-user
/// generation counter suppresses stale background refetches: a refetch
/// begun under generation g only applies if no write happened since.
use parking_lot::RwLock;
use std::collections::HashMap;

struct Slate<T> {
    entries: Vec<T>,
    generation: u64,
}

impl<T> Default for Slate<T> {
    fn default() -> Self {
        Slate {
            entries: Vec::new(),
            generation: 0,
        }
    }
}

/// Ticket handed out when a refetch begins; carries the generation the
/// refetch is allowed to reconcile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefetchTicket {
    generation: u64,
}

/// In-memory keyed store with full-list-replace semantics
pub struct ReflectedCache<T: Clone> {
    slates: RwLock<HashMap<String, Slate<T>>>,
}

impl<T: Clone> ReflectedCache<T> {
    pub fn new() -> Self {
        Self {
            slates: RwLock::new(HashMap::new()),
        }
    }

    /// Current list for a user; empty if never populated
    pub fn get(&self, user_id: &str) -> Vec<T> {
        self.slates
            .read()
            .get(user_id)
            .map(|slate| slate.entries.clone())
            .unwrap_or_default()
    }

    /// Replace the whole list. Bumps the generation so refetches begun
    /// before this write cannot clobber it.
    pub fn set(&self, user_id: &str, entries: Vec<T>) {
        let mut slates = self.slates.write();
        let slate = slates.entry(user_id.to_string()).or_default();
        slate.generation += 1;
        slate.entries = entries;
    }

    /// Suppress any in-flight refetch for this user (best effort: a
    /// refetch that already completed is not undone).
    pub fn cancel_pending_refetch(&self, user_id: &str) {
        let mut slates = self.slates.write();
        slates.entry(user_id.to_string()).or_default().generation += 1;
    }

    /// Cancel pending refetches, snapshot the current list and replace
    /// it with the rewritten one, all under a single lock acquisition.
    /// Returns the snapshot for rollback.
    pub fn mutate<F>(&self, user_id: &str, rewrite: F) -> Vec<T>
    where
        F: FnOnce(&[T]) -> Vec<T>,
    {
        let mut slates = self.slates.write();
        let slate = slates.entry(user_id.to_string()).or_default();
        slate.generation += 1;
        let updated = rewrite(&slate.entries);
        std::mem::replace(&mut slate.entries, updated)
    }

    /// Start a refetch for this user
    pub fn begin_refetch(&self, user_id: &str) -> RefetchTicket {
        let generation = self
            .slates
            .read()
            .get(user_id)
            .map(|slate| slate.generation)
            .unwrap_or(0);
        RefetchTicket { generation }
    }

    /// Apply a completed refetch. Returns false (and discards the list)
    /// if a write happened since the refetch began.
    pub fn complete_refetch(&self, user_id: &str, ticket: RefetchTicket, entries: Vec<T>) -> bool {
        let mut slates = self.slates.write();
        let slate = slates.entry(user_id.to_string()).or_default();
        if slate.generation != ticket.generation {
            return false;
        }
        slate.generation += 1;
        slate.entries = entries;
        true
    }
}

impl<T: Clone> Default for ReflectedCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
