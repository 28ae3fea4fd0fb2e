//! Listener lifecycle: bind, accept, stop.
//!
//! [`Server`] collects configuration, routes and event callbacks. Starting
//! it binds the listener, fires the application started event and spawns the
//! accept loop; the returned [`RunningServer`] stops it again.

pub mod listener;
pub mod shutdown;
pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::application::ApplicationStore;
use crate::auth::Authenticator;
use crate::config::{Config, ServerConfig};
use crate::events::ServerEvents;
use crate::router::{Handler, Router};
use crate::session::SessionStore;

use shutdown::Shutdown;

/// State shared by the accept loop and every connection.
pub struct ServerState {
    pub(crate) router: Router,
    pub(crate) sessions: SessionStore,
    pub(crate) application: ApplicationStore,
    pub(crate) events: ServerEvents,
    pub(crate) authenticator: Authenticator,
    pub(crate) persistent_connections: bool,
    pub(crate) keep_alive_timeout: Duration,
    pub(crate) keep_alive_max: usize,
    pub(crate) max_body_size: usize,
    pub(crate) session_timeout: Duration,
    pub(crate) resolve_dns_names: bool,
}

impl ServerState {
    /// Fresh state with empty session and application stores.
    pub fn new(config: &ServerConfig, router: Router, events: ServerEvents) -> Self {
        Self {
            router,
            sessions: SessionStore::new(),
            application: ApplicationStore::new(),
            events,
            authenticator: Authenticator::new(config.authentication),
            persistent_connections: config.persistent_connections,
            keep_alive_timeout: config.keep_alive_timeout(),
            keep_alive_max: config.keep_alive_max,
            max_body_size: config.max_body_size,
            session_timeout: config.session_timeout(),
            resolve_dns_names: config.resolve_dns_names,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn application(&self) -> &ApplicationStore {
        &self.application
    }

    pub fn events(&self) -> &ServerEvents {
        &self.events
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// A server that has not been started yet.
pub struct Server {
    config: Config,
    router: Router,
    events: ServerEvents,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            router: Router::new(),
            events: ServerEvents::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Routes requests under `prefix` to a default-constructed `H`.
    pub fn route<H>(&mut self, prefix: impl Into<String>) -> &mut Self
    where
        H: Handler + Default + 'static,
    {
        self.router.route::<H>(prefix);
        self
    }

    pub fn with_events(mut self, events: ServerEvents) -> Self {
        self.events = events;
        self
    }

    /// Binds the listener and starts accepting connections.
    pub async fn start(self) -> Result<RunningServer> {
        self.config.validate()?;

        let tls = if self.config.tls.enabled {
            Some(tls::load_tls_acceptor(&self.config.tls)?)
        } else {
            None
        };

        let listen_addr = &self.config.server.listen_addr;
        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", listen_addr))?;
        let local_addr = listener
            .local_addr()
            .context("failed to get local address")?;

        let state = Arc::new(ServerState::new(&self.config.server, self.router, self.events));
        state.events.application_started(&state.application);

        let shutdown = Shutdown::new();
        let accept = tokio::spawn(listener::run(
            listener,
            Arc::clone(&state),
            tls,
            shutdown.subscribe(),
        ));

        tracing::info!(
            address = %local_addr,
            tls = self.config.tls.enabled,
            authentication = %state.authenticator.method(),
            "Listening"
        );

        Ok(RunningServer {
            local_addr,
            state,
            shutdown,
            accept,
        })
    }
}

/// Handle to a listening server.
pub struct RunningServer {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Shutdown,
    accept: JoinHandle<()>,
}

impl RunningServer {
    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.state.sessions
    }

    pub fn application(&self) -> &ApplicationStore {
        &self.state.application
    }

    /// Stops accepting, ends every session and fires the application ended
    /// event. Connections already being served run to completion.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.trigger();
        self.accept.await.context("accept loop failed")?;

        let ended = self.state.sessions.stop(&self.state.events);
        self.state.events.application_ended(&self.state.application);

        tracing::info!(address = %self.local_addr, sessions_ended = ended, "Server stopped");
        Ok(())
    }
}
