//! Per-client session state.
//!
//! Sessions live in the process-wide [`SessionStore`] and are addressed by
//! the [`SESSION_COOKIE`] cookie. A request only gets a session when its
//! handler first writes to one; reading never creates anything.

pub mod store;

use serde_json::Value;

use crate::events::ServerEvents;

pub use store::{SESSION_COOKIE, SessionEntry, SessionInfo, SessionStore, SessionValues};

/// Handler-facing view of the session bound to the current request.
#[derive(Debug, Clone)]
pub struct Session {
    store: SessionStore,
    events: ServerEvents,
    id: Option<String>,
}

impl Session {
    pub(crate) fn new(store: SessionStore, events: ServerEvents) -> Self {
        Self {
            store,
            events,
            id: None,
        }
    }

    /// Binds to an existing session presented by the client and refreshes
    /// its last access time. Unknown ids leave the request anonymous.
    pub(crate) fn resume(&mut self, id: &str) -> bool {
        if self.store.touch(id) {
            self.id = Some(id.to_string());
            true
        } else {
            tracing::debug!(session_id = %id, "Ignoring unknown session cookie");
            false
        }
    }

    /// Session id, `None` until a session has been resumed or created.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let id = self.id.as_deref()?;
        self.store.with_values(id, |values| values.get(key).cloned())?
    }

    pub fn contains(&self, key: &str) -> bool {
        self.id
            .as_deref()
            .and_then(|id| self.store.with_values(id, |values| values.contains_key(key)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.id
            .as_deref()
            .and_then(|id| self.store.with_values(id, |values| values.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a value, creating the session first if the request has none.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        loop {
            let id = self.bind_or_create();
            // The entry can vanish between binding and writing if a sweep
            // runs concurrently; start over with a fresh session then.
            match self
                .store
                .with_values(&id, |values| values.insert(key.clone(), value.clone()))
            {
                Some(previous) => return previous,
                None => self.id = None,
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let id = self.id.as_deref()?;
        self.store.with_values(id, |values| values.remove(key))?
    }

    fn bind_or_create(&mut self) -> String {
        match &self.id {
            Some(id) if self.store.contains(id) => id.clone(),
            _ => {
                let id = self.store.create(&self.events);
                self.id = Some(id.clone());
                id
            }
        }
    }
}
