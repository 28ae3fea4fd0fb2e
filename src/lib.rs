//! ember - embeddable HTTP/1.1 server
//!
//! Accepts plain or TLS connections, parses requests, dispatches them to
//! handlers by path prefix and keeps per-client sessions, with optional
//! Basic or Digest authentication.

pub mod application;
pub mod auth;
pub mod config;
pub mod events;
pub mod http;
pub mod router;
pub mod server;
pub mod session;

pub use application::ApplicationStore;
pub use config::Config;
pub use events::ServerEvents;
pub use http::context::HttpContext;
pub use router::{Handler, Router};
pub use server::{RunningServer, Server};
