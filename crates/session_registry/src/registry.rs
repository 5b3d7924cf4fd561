//! # Session registry
//!
//! Thread-safe keyed store of [`SessionValue`]s. Reads and writes go through
//! a sharded [`DashMap`]; updates use an optimistic read/transform/commit
//! loop so that a transform never runs while a shard lock is held.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::{SessionError, SessionId, SessionValue};

/// Operational counters for a [`SessionRegistry`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub tracked_sessions: usize,
    pub sessions_added: u64,
    pub sessions_removed: u64,
    pub updates_applied: u64,
    pub updates_missed: u64,
    /// Transforms that failed or tried to change the session id.
    pub updates_rejected: u64,
    pub commit_retries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    added: AtomicU64,
    removed: AtomicU64,
    applied: AtomicU64,
    missed: AtomicU64,
    rejected: AtomicU64,
    retries: AtomicU64,
}

/// Authoritative store of live sessions keyed by [`SessionId`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionValue>>,
    counters: Counters,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: DashMap::with_capacity(capacity),
            counters: Counters::default(),
        }
    }

    /// Inserts or overwrites the entry for `value.id()`.
    ///
    /// Overwriting is a valid re-registration (reconnect); the previous value
    /// is returned.
    pub fn add(&self, value: SessionValue) -> Option<Arc<SessionValue>> {
        let id = value.id();
        let previous = self.sessions.insert(id, Arc::new(value));
        self.counters.added.fetch_add(1, Ordering::Relaxed);

        if previous.is_some() {
            debug!("Session {} re-registered", id);
        } else {
            trace!("Session {} registered", id);
        }
        previous
    }

    /// Deletes the entry for `id`. Absent ids are a no-op.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionValue>> {
        let removed = self.sessions.remove(id).map(|(_, value)| value);
        if removed.is_some() {
            self.counters.removed.fetch_add(1, Ordering::Relaxed);
            trace!("Session {} removed", id);
        }
        removed
    }

    /// Current snapshot for `id`, if tracked.
    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionValue>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies `transform` to the entry for `id` without losing concurrent
    /// updates. Returns whether the update was committed.
    ///
    /// `transform` may run more than once when racing other writers, so it
    /// must be a pure function of its input.
    ///
    /// A transform that returns a value with a different id is not applied:
    /// `false` is returned and the attempt is counted in
    /// [`RegistryStats::updates_rejected`], not `updates_missed`. Callers
    /// that need to tell the two apart use [`try_update`](Self::try_update).
    pub fn update<F>(&self, id: &SessionId, transform: F) -> bool
    where
        F: Fn(&SessionValue) -> SessionValue,
    {
        self.update_and_get(id, transform).is_some()
    }

    /// Like [`update`](Self::update) but returns the committed value.
    pub fn update_and_get<F>(&self, id: &SessionId, transform: F) -> Option<Arc<SessionValue>>
    where
        F: Fn(&SessionValue) -> SessionValue,
    {
        match self.try_update(id, |current| Ok(transform(current))) {
            Ok(committed) => committed,
            Err(e) => {
                warn!("Update of session {} rejected: {}", id, e);
                None
            }
        }
    }

    /// Fallible update. On error the stored value is left as it was and the
    /// error is returned to the caller.
    ///
    /// Returns `Ok(None)` when no entry exists for `id` at read or commit
    /// time.
    pub fn try_update<F>(
        &self,
        id: &SessionId,
        transform: F,
    ) -> Result<Option<Arc<SessionValue>>, SessionError>
    where
        F: Fn(&SessionValue) -> Result<SessionValue, SessionError>,
    {
        loop {
            let Some(current) = self.get(id) else {
                self.counters.missed.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            };

            // No shard lock is held here.
            let next = match transform(&current) {
                Ok(next) if next.id() == *id => next,
                Ok(next) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(SessionError::IdMismatch {
                        expected: *id,
                        found: next.id(),
                    });
                }
                Err(e) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            };
            let next = Arc::new(next);

            match self.sessions.get_mut(id) {
                Some(mut entry) if Arc::ptr_eq(entry.value(), &current) => {
                    *entry.value_mut() = Arc::clone(&next);
                    drop(entry);
                    self.counters.applied.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(next));
                }
                Some(_) => {
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                None => {
                    self.counters.missed.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            }
        }
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn snapshot(&self) -> Vec<Arc<SessionValue>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Visits a snapshot of every tracked session.
    ///
    /// `f` is called after the map has been released, so it may call back
    /// into the registry.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&SessionValue),
    {
        for value in self.snapshot() {
            f(&value);
        }
    }

    /// Drops every entry whose session is no longer active.
    ///
    /// Activity is checked on the scanned snapshot, outside any shard lock.
    /// Removal only happens if the entry is still that exact snapshot, so a
    /// reconnect (or any update) racing the prune survives.
    pub fn prune_inactive(&self) -> usize {
        let mut pruned = 0;
        for value in self.snapshot() {
            if value.is_active() {
                continue;
            }
            let removed = self
                .sessions
                .remove_if(&value.id(), |_, stored| Arc::ptr_eq(stored, &value));
            if removed.is_some() {
                pruned += 1;
            }
        }

        if pruned > 0 {
            self.counters
                .removed
                .fetch_add(pruned as u64, Ordering::Relaxed);
            debug!("Pruned {} inactive sessions", pruned);
        }
        pruned
    }

    /// Forgets every session.
    pub fn clear(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        debug!("Cleared {} sessions", count);
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            tracked_sessions: self.sessions.len(),
            sessions_added: self.counters.added.load(Ordering::Relaxed),
            sessions_removed: self.counters.removed.load(Ordering::Relaxed),
            updates_applied: self.counters.applied.load(Ordering::Relaxed),
            updates_missed: self.counters.missed.load(Ordering::Relaxed),
            updates_rejected: self.counters.rejected.load(Ordering::Relaxed),
            commit_retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }
}
