//! Lifecycle and authentication callbacks.
//!
//! Callbacks run synchronously on the task that triggers them: application
//! events on the task calling `start`/`stop`, session and authentication
//! events on the connection task handling the request. An unset callback is
//! simply skipped.

use std::fmt;
use std::sync::Arc;

use crate::application::ApplicationStore;
use crate::auth::Credentials;
use crate::session::SessionInfo;

type ApplicationCallback = Arc<dyn Fn(&ApplicationStore) + Send + Sync>;
type SessionCallback = Arc<dyn Fn(&SessionInfo) + Send + Sync>;
type AuthenticationCallback = Arc<dyn Fn(&mut Credentials) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ServerEvents {
    application_start: Option<ApplicationCallback>,
    application_end: Option<ApplicationCallback>,
    session_start: Option<SessionCallback>,
    session_end: Option<SessionCallback>,
    authenticate: Option<AuthenticationCallback>,
}

impl ServerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_application_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApplicationStore) + Send + Sync + 'static,
    {
        self.application_start = Some(Arc::new(f));
        self
    }

    pub fn on_application_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApplicationStore) + Send + Sync + 'static,
    {
        self.application_end = Some(Arc::new(f));
        self
    }

    pub fn on_session_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&SessionInfo) + Send + Sync + 'static,
    {
        self.session_start = Some(Arc::new(f));
        self
    }

    pub fn on_session_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&SessionInfo) + Send + Sync + 'static,
    {
        self.session_end = Some(Arc::new(f));
        self
    }

    /// Sets the callback deciding whether a login is accepted.
    ///
    /// Without it Basic logins only succeed with an empty password and
    /// Digest logins only with a response computed from an empty password.
    pub fn on_authenticate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Credentials) + Send + Sync + 'static,
    {
        self.authenticate = Some(Arc::new(f));
        self
    }

    pub fn application_started(&self, application: &ApplicationStore) {
        if let Some(cb) = &self.application_start {
            cb(application);
        }
    }

    pub fn application_ended(&self, application: &ApplicationStore) {
        if let Some(cb) = &self.application_end {
            cb(application);
        }
    }

    pub fn session_started(&self, session: &SessionInfo) {
        tracing::debug!(session_id = %session.id, "Session started");
        if let Some(cb) = &self.session_start {
            cb(session);
        }
    }

    pub fn session_ended(&self, session: &SessionInfo) {
        tracing::debug!(session_id = %session.id, "Session ended");
        if let Some(cb) = &self.session_end {
            cb(session);
        }
    }

    pub fn authenticate(&self, credentials: &mut Credentials) {
        if let Some(cb) = &self.authenticate {
            cb(credentials);
        }
    }
}

impl fmt::Debug for ServerEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEvents")
            .field("application_start", &self.application_start.is_some())
            .field("application_end", &self.application_end.is_some())
            .field("session_start", &self.session_start.is_some())
            .field("session_end", &self.session_end.is_some())
            .field("authenticate", &self.authenticate.is_some())
            .finish()
    }
}
