//! Process-wide session registry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::events::ServerEvents;

/// Cookie name carrying the session id. Reserved: handlers never see it as
/// an ordinary cookie.
pub const SESSION_COOKIE: &str = "EMBERSESSIONID";

pub type SessionValues = HashMap<String, Value>;

/// One session: its values and the last time a client presented its id.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    values: SessionValues,
    last_access: DateTime<Utc>,
}

impl SessionEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            values: SessionValues::new(),
            last_access: now,
        }
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    pub fn is_timed_out(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        match self.last_access.checked_add_signed(timeout) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Session id and values as passed to session start/end callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    pub values: SessionValues,
}

/// Map of session id to [`SessionEntry`], shared by all connections.
///
/// Every operation takes the lock for its own duration only. Callbacks are
/// always invoked with the lock released, so they may use the store.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<String, SessionEntry>>>,
    /// Ids whose session ended callback is running
    ending: Arc<Mutex<HashSet<String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lookup(&self, id: &str) -> Option<SessionEntry> {
        self.entries().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mints a new id, registers an empty entry under it and fires the
    /// session started callback.
    pub fn create(&self, events: &ServerEvents) -> String {
        self.create_at(Utc::now(), events)
    }

    pub fn create_at(&self, now: DateTime<Utc>, events: &ServerEvents) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.entries().insert(id.clone(), SessionEntry::new(now));

        events.session_started(&SessionInfo {
            id: id.clone(),
            values: SessionValues::new(),
        });
        id
    }

    /// Refreshes the last access time. Returns `false` for unknown ids.
    pub fn touch(&self, id: &str) -> bool {
        self.touch_at(id, Utc::now())
    }

    pub fn touch_at(&self, id: &str, now: DateTime<Utc>) -> bool {
        match self.entries().get_mut(id) {
            Some(entry) => {
                entry.last_access = now;
                true
            }
            None => false,
        }
    }

    /// Runs `f` on the values of session `id` under the lock.
    pub fn with_values<R>(&self, id: &str, f: impl FnOnce(&mut SessionValues) -> R) -> Option<R> {
        self.entries().get_mut(id).map(|entry| f(&mut entry.values))
    }

    /// Removes a single session, firing the session ended callback.
    pub fn remove(&self, id: &str, events: &ServerEvents) -> bool {
        self.end_where(id, events, |_| true)
    }

    /// Removes every session idle for at least `timeout`.
    pub fn sweep_expired(&self, timeout: Duration, events: &ServerEvents) -> usize {
        self.sweep_expired_at(Utc::now(), timeout, events)
    }

    pub fn sweep_expired_at(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
        events: &ServerEvents,
    ) -> usize {
        let removed = self
            .ids()
            .iter()
            .filter(|id| self.end_where(id, events, |entry| entry.is_timed_out(timeout, now)))
            .count();

        if removed > 0 {
            tracing::info!(removed, remaining = self.len(), "Swept expired sessions");
        }
        removed
    }

    /// Ends every remaining session. Used on server shutdown.
    pub fn stop(&self, events: &ServerEvents) -> usize {
        self.ids()
            .iter()
            .filter(|id| self.end_where(id, events, |_| true))
            .count()
    }

    fn ids(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    // Fires session ended for `id` and then removes it, provided the entry
    // still exists and satisfies `predicate` at both points. Only one caller
    // at a time may end a given id; concurrent attempts return `false`.
    fn end_where(
        &self,
        id: &str,
        events: &ServerEvents,
        predicate: impl Fn(&SessionEntry) -> bool,
    ) -> bool {
        let values = {
            let entries = self.entries();
            match entries.get(id) {
                Some(entry) if predicate(entry) && self.ending().insert(id.to_string()) => {
                    entry.values.clone()
                }
                _ => return false,
            }
        };

        events.session_ended(&SessionInfo {
            id: id.to_string(),
            values,
        });

        let mut entries = self.entries();
        self.ending().remove(id);
        match entries.get(id) {
            Some(entry) if predicate(entry) => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }
}
