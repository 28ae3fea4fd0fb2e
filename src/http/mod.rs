//! HTTP/1.1 protocol implementation.
//!
//! # Architecture
//!
//! - **`connection`**: per-connection request/response state machine
//! - **`parser`**: parses requests out of the connection's byte buffer
//! - **`request`**: request representation and header lookup
//! - **`response`**: response being built by a handler, status handling
//! - **`writer`**: serializes responses and writes them to the client
//! - **`cookie`**: `Cookie` header parsing and the per-request cookie jar
//! - **`form`**: query string and form body parsing
//! - **`context`**: what a handler sees while processing one request
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received (or rejected as malformed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Authenticate, route, run handler
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Error responses (400, 401, 404, 405, 500) always close the connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ember::config::ServerConfig;
//! use ember::events::ServerEvents;
//! use ember::http::connection::{Connection, ConnectionInfo};
//! use ember::router::Router;
//! use ember::server::ServerState;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let state = Arc::new(ServerState::new(
//!         &ServerConfig::default(),
//!         Router::new(),
//!         ServerEvents::new(),
//!     ));
//!
//!     loop {
//!         let (socket, peer) = listener.accept().await?;
//!         let info = ConnectionInfo::new(socket.local_addr()?, peer);
//!         let state = Arc::clone(&state);
//!         tokio::spawn(async move {
//!             Connection::new(socket, info, state).run().await;
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod context;
pub mod cookie;
pub mod form;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
