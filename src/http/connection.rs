use std::net::{IpAddr, SocketAddr};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::timeout;

use crate::http::context::HttpContext;
use crate::http::cookie::{CookieJar, parse_cookie_header};
use crate::http::parser::{ParseError, parse_http_request_limited};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::ServerState;
use crate::session::{SESSION_COOKIE, Session};

const READ_CHUNK: usize = 4096;

/// Addresses and names of the two ends of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub local_addr: IpAddr,
    pub remote_addr: IpAddr,
    pub local_name: String,
    pub remote_name: String,
    /// Local port the client connected to
    pub port: u16,
    pub secure: bool,
}

impl ConnectionInfo {
    /// Connection metadata with addresses used as names.
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            local_addr: local.ip(),
            remote_addr: remote.ip(),
            local_name: local.ip().to_string(),
            remote_name: remote.ip().to_string(),
            port: local.port(),
            secure: false,
        }
    }
}

/// Drives one client connection through its request/response cycles.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    state: ConnectionState,
    info: ConnectionInfo,
    server: Arc<ServerState>,
    served: usize,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// Result of waiting for the next request.
enum ReadOutcome {
    Request(Request),
    Rejected(StatusCode),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, info: ConnectionInfo, server: Arc<ServerState>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
            info,
            server,
            served: 0,
        }
    }

    /// Serves requests until the connection closes. Read, write and protocol
    /// errors end the connection; none of them are reported to the caller.
    pub async fn run(&mut self) {
        loop {
            match &mut self.state {
                ConnectionState::Reading => match self.read_request().await {
                    ReadOutcome::Request(req) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    ReadOutcome::Rejected(status) => {
                        let writer = ResponseWriter::new(&Response::error(status), &[], false);
                        self.state = ConnectionState::Writing(writer, false);
                    }
                    ReadOutcome::Closed => {
                        self.state = ConnectionState::Closed;
                    }
                },

                ConnectionState::Processing(req) => {
                    self.served += 1;
                    let req: &Request = req;
                    let (server, info, served) = (&self.server, &self.info, self.served);
                    let (writer, keep_alive) =
                        run_handler(|| Self::handle_request(server, info, served, req));
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    if let Err(e) = writer.write_to_stream(&mut self.stream).await {
                        tracing::debug!(peer = %self.info.remote_addr, error = %e, "Write failed");
                        self.state = ConnectionState::Closed;
                    } else if *keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        let _ = self.stream.shutdown().await;
    }

    /// Reads until a full request is buffered. Timeouts, resets and EOF all
    /// end the connection without a response.
    async fn read_request(&mut self) -> ReadOutcome {
        loop {
            // Try parsing whatever we already have
            if !self.buffer.is_empty() {
                match parse_http_request_limited(&self.buffer, self.server.max_body_size) {
                    Ok((request, consumed)) => {
                        let _ = self.buffer.split_to(consumed);
                        return ReadOutcome::Request(request);
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(ParseError::InvalidMethod) => {
                        return ReadOutcome::Rejected(StatusCode::MethodNotAllowed);
                    }
                    Err(e) => {
                        tracing::debug!(peer = %self.info.remote_addr, error = ?e, "Malformed request");
                        return ReadOutcome::Rejected(StatusCode::BadRequest);
                    }
                }
            }

            // Read more data
            self.buffer.reserve(READ_CHUNK);
            let read = timeout(
                self.server.keep_alive_timeout,
                self.stream.read_buf(&mut self.buffer),
            )
            .await;

            match read {
                Ok(Ok(0)) => return ReadOutcome::Closed, // client closed connection
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(peer = %self.info.remote_addr, error = %e, "Read failed");
                    return ReadOutcome::Closed;
                }
                Err(_) => {
                    tracing::debug!(peer = %self.info.remote_addr, "Read timed out");
                    return ReadOutcome::Closed;
                }
            }
        }
    }

    fn handle_request(
        server: &ServerState,
        info: &ConnectionInfo,
        served: usize,
        req: &Request,
    ) -> (ResponseWriter, bool) {
        let keep_alive =
            server.persistent_connections && req.wants_keep_alive() && served < server.keep_alive_max;

        if !req.method.is_supported() {
            return Self::reject(info, req, Response::error(StatusCode::MethodNotAllowed));
        }

        let credentials = server.authenticator.authenticate(
            req.header("Authorization"),
            req.method.as_str(),
            &server.events,
        );
        if server.authenticator.is_required() && credentials.is_none() {
            let mut response = Response::error(StatusCode::Unauthorized);
            let host = req.header("Host").unwrap_or_default();
            if let Some(challenge) = server
                .authenticator
                .challenge(&info.remote_addr.to_string(), host)
            {
                if let Err(e) = response.add_header("WWW-Authenticate", challenge) {
                    tracing::debug!(error = %e, "Challenge not sent");
                }
            }
            return Self::reject(info, req, response);
        }

        let mut cookies = CookieJar::new();
        let mut session = Session::new(server.sessions.clone(), server.events.clone());
        for line in req.header_values("Cookie") {
            for (key, value) in parse_cookie_header(line) {
                if key == SESSION_COOKIE {
                    session.resume(&value);
                } else {
                    cookies.add_incoming(key, value);
                }
            }
        }

        let Some(handler) = server.router.resolve(&req.path) else {
            return Self::reject(info, req, Response::error(StatusCode::NotFound));
        };

        let mut response = Response::new();
        let outcome = {
            let mut ctx = HttpContext::new(
                req,
                info,
                credentials.as_ref(),
                server.authenticator.method(),
                &mut response,
                &mut cookies,
                &mut session,
                &server.application,
            );
            catch_unwind(AssertUnwindSafe(|| handler.process_request(&mut ctx)))
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(method = %req.method, path = %req.path, error = %e, "Handler failed");
                return Self::reject(info, req, Response::error(StatusCode::InternalServerError));
            }
            Err(_) => {
                tracing::error!(method = %req.method, path = %req.path, "Handler panicked");
                return Self::reject(info, req, Response::error(StatusCode::InternalServerError));
            }
        }

        let mut set_cookies: Vec<String> =
            cookies.outgoing().iter().map(|c| c.to_string()).collect();
        if let Some(id) = session.id() {
            set_cookies.push(format!("{}={}", SESSION_COOKIE, id));
        }

        tracing::info!(
            peer = %info.remote_addr,
            method = %req.method,
            path = %req.path,
            status = response.status.code,
            keep_alive,
            "Request served"
        );

        (ResponseWriter::new(&response, &set_cookies, keep_alive), keep_alive)
    }

    fn reject(info: &ConnectionInfo, req: &Request, response: Response) -> (ResponseWriter, bool) {
        tracing::info!(
            peer = %info.remote_addr,
            method = %req.method,
            path = %req.path,
            status = response.status.code,
            "Request rejected"
        );
        (ResponseWriter::new(&response, &[], false), false)
    }
}

/// Runs request processing, which calls into synchronous handler code. On a
/// multi-threaded runtime the worker hands its other tasks off first.
fn run_handler<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
