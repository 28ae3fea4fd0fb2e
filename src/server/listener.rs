use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::http::connection::{Connection, ConnectionInfo};
use crate::server::ServerState;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until the shutdown signal fires. Each connection runs
/// on its own task; connections already running are left to finish.
pub async fn run(
    listener: TcpListener,
    state: Arc<ServerState>,
    tls: Option<TlsAcceptor>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Listener stopped");
                break;
            }

            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                debug!(peer = %peer, "Accepted connection");

                state.sessions.sweep_expired(state.session_timeout, &state.events);

                let state = Arc::clone(&state);
                let tls = tls.clone();
                tokio::spawn(async move {
                    serve(socket, peer, state, tls).await;
                });
            }
        }
    }
}

async fn serve(
    socket: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    tls: Option<TlsAcceptor>,
) {
    let local = match socket.local_addr() {
        Ok(local) => local,
        Err(e) => {
            debug!(peer = %peer, error = %e, "Connection lost before setup");
            return;
        }
    };

    let mut info = ConnectionInfo::new(local, peer);
    if state.resolve_dns_names {
        let names = async { tokio::join!(resolve_name(local.ip()), resolve_name(peer.ip())) };
        match timeout(state.keep_alive_timeout, names).await {
            Ok((local_name, remote_name)) => {
                info.local_name = local_name;
                info.remote_name = remote_name;
            }
            Err(_) => debug!(peer = %peer, "Reverse lookup timed out"),
        }
    }

    match tls {
        Some(acceptor) => match timeout(state.keep_alive_timeout, acceptor.accept(socket)).await {
            Ok(Ok(stream)) => {
                info.secure = true;
                run_connection(stream, info, state).await;
            }
            Ok(Err(e)) => debug!(peer = %peer, error = %e, "TLS handshake failed"),
            Err(_) => debug!(peer = %peer, "TLS handshake timed out"),
        },
        None => run_connection(socket, info, state).await,
    }
}

async fn run_connection<S>(stream: S, info: ConnectionInfo, state: Arc<ServerState>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = Connection::new(stream, info, state);
    conn.run().await;
}

/// Reverse DNS name for `addr`. Loopback is always `localhost`; lookup
/// failures fall back to the textual address.
pub async fn resolve_name(addr: IpAddr) -> String {
    if addr.is_loopback() {
        return "localhost".to_string();
    }

    match tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr)).await {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "Reverse lookup failed");
            addr.to_string()
        }
        Err(_) => addr.to_string(),
    }
}
