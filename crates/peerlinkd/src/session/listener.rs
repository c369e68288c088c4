//! Inbound TCP listener.
//!
//! Binds the node's port and accepts until stopped, handing every connection
//! to its own handler task. The loop never waits on a handler.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use peerlink_core::wire::ACCEPT_POLL_MS;
use peerlink_core::NodeError;

use super::handler::{handle_connection, HandlerContext};

const LISTEN_BACKLOG: i32 = 128;

/// Lifecycle: Created → Listening → Stopping → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Listening,
    Stopping,
    Stopped,
}

/// A bound listening socket that is not accepting yet.
pub struct Listener {
    socket: TcpListener,
    local_addr: SocketAddr,
    state: watch::Sender<ListenerState>,
}

impl Listener {
    /// Bind `host:port`. Port 0 picks a free port.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(host: &str, port: u16) -> Result<Self, NodeError> {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| NodeError::InvalidBindAddr(host.to_string()))?;
        let addr = SocketAddr::new(ip, port);

        let bind_err = |source| NodeError::Bind { addr, source };
        let socket = make_listener_socket(addr).map_err(bind_err)?;
        let socket = TcpListener::from_std(socket).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        let (state, _) = watch::channel(ListenerState::Created);
        tracing::info!(addr = %local_addr, "listener bound");
        Ok(Self {
            socket,
            local_addr,
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Start the accept loop.
    pub fn spawn(self, ctx: Arc<HandlerContext>) -> ListenerHandle {
        let Listener {
            socket,
            local_addr,
            state,
        } = self;

        state.send_replace(ListenerState::Listening);
        let task = tokio::spawn(accept_loop(socket, ctx, state.subscribe()));
        tracing::info!(addr = %local_addr, "listening");

        ListenerHandle {
            state,
            task: Some(task),
            local_addr,
        }
    }
}

/// Control handle for a running listener. Dropping it also ends the loop.
pub struct ListenerHandle {
    state: watch::Sender<ListenerState>,
    task: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Stop accepting and close the socket. In-flight handlers keep running.
    /// Calling this again is a no-op.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        self.state.send_replace(ListenerState::Stopping);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "accept loop ended abnormally");
        }
        self.state.send_replace(ListenerState::Stopped);
        tracing::info!(port = self.port(), "listener stopped");
    }
}

async fn accept_loop(
    socket: TcpListener,
    ctx: Arc<HandlerContext>,
    mut state: watch::Receiver<ListenerState>,
) {
    let poll = Duration::from_millis(ACCEPT_POLL_MS);

    loop {
        if *state.borrow_and_update() != ListenerState::Listening {
            break;
        }

        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    tracing::debug!("listener handle dropped");
                    break;
                }
            }

            // Bounded wait so a stop request is never stuck behind accept.
            accepted = timeout(poll, socket.accept()) => match accepted {
                Ok(Ok((stream, remote))) => spawn_handler(stream, remote, &ctx),
                Ok(Err(e)) => tracing::warn!(error = %e, "failed to accept connection"),
                Err(_) => {}
            }
        }
    }

    drop(socket);
    tracing::info!("listener socket closed");
}

fn spawn_handler(stream: TcpStream, remote: SocketAddr, ctx: &Arc<HandlerContext>) {
    tracing::debug!(%remote, "accepted connection");
    let ctx = Arc::clone(ctx);
    tokio::spawn(handle_connection(stream, remote, ctx));
}

/// Create a non-blocking listening socket with SO_REUSEADDR, so a restarted
/// node can rebind its port right away.
fn make_listener_socket(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
