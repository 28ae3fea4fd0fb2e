//! Path-prefix routing to request handlers.

use std::fmt;
use std::sync::Arc;

use crate::http::context::HttpContext;

/// A page: processes one request by writing to the context's response.
///
/// Returning an error, or panicking, turns the response into a 500.
pub trait Handler: Send + Sync {
    fn process_request(&self, ctx: &mut HttpContext<'_>) -> anyhow::Result<()>;
}

/// Creates a fresh handler for every request routed to it.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

#[derive(Clone)]
pub struct RouteEntry {
    path: String,
    factory: HandlerFactory,
}

impl RouteEntry {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry").field("path", &self.path).finish()
    }
}

/// Ordered list of routes. The first entry whose path is a prefix of the
/// request path wins, so register more specific prefixes first.
#[derive(Debug, Clone, Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes requests under `prefix` to handlers built by `factory`.
    pub fn add<F, H>(&mut self, prefix: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: Handler + 'static,
    {
        self.entries.push(RouteEntry {
            path: prefix.into(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Handler>),
        });
        self
    }

    /// Routes requests under `prefix` to a default-constructed `H`.
    pub fn route<H>(&mut self, prefix: impl Into<String>) -> &mut Self
    where
        H: Handler + Default + 'static,
    {
        self.add(prefix, H::default)
    }

    /// Removes every route registered for exactly `prefix`.
    pub fn remove(&mut self, prefix: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.path != prefix);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the handler for `path`, or `None` when nothing matches.
    pub fn resolve(&self, path: &str) -> Option<Box<dyn Handler>> {
        self.entries
            .iter()
            .find(|entry| path.starts_with(entry.path.as_str()))
            .map(|entry| (entry.factory)())
    }
}
