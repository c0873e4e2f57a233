//! Async TCP server using Tokio.
//!
//! [`Server`] accepts TCP connections forever and hands each one to a
//! [`Dispatcher`], which runs a connection session on its own task as long
//! as the concurrency ceiling allows.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::fs::{FileSystem, LocalFs};
use crate::http::ContentTypeRegistry;

pub mod session;

pub use session::{SessionEnd, SessionError, SessionSummary, serve_connection};

/// Errors produced by the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only state shared by every connection.
#[derive(Debug)]
pub struct ServerContext<F = LocalFs> {
    document_root: PathBuf,
    registry: ContentTypeRegistry,
    files: F,
    timeout: Duration,
}

impl ServerContext<LocalFs> {
    /// Serves files from `document_root` on the local disk.
    pub fn new(
        document_root: impl Into<PathBuf>,
        registry: ContentTypeRegistry,
        timeout: Duration,
    ) -> Self {
        Self::with_files(document_root, registry, LocalFs, timeout)
    }
}

impl<F> ServerContext<F> {
    /// Serves files from `document_root` through `files`.
    pub fn with_files(
        document_root: impl Into<PathBuf>,
        registry: ContentTypeRegistry,
        files: F,
        timeout: Duration,
    ) -> Self {
        Self {
            document_root: document_root.into(),
            registry,
            files,
            timeout,
        }
    }

    /// Directory that request targets are resolved against.
    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Extension to content-type table.
    pub fn registry(&self) -> &ContentTypeRegistry {
        &self.registry
    }

    /// Storage the served files are read from.
    pub fn files(&self) -> &F {
        &self.files
    }

    /// Per-connection timeout applied to waiting for a request and to each write.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Outcome of [`Dispatcher::dispatch`].
///
/// The accept loop ignores it; the handle is for callers that want to await
/// the session.
#[derive(Debug)]
pub enum Admission {
    /// A session task was spawned; the handle resolves when the connection is closed.
    Accepted(JoinHandle<()>),
    /// The concurrency ceiling was reached and the connection was dropped.
    Rejected,
}

impl Admission {
    /// Returns `true` if a session task was spawned.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Runs one session task per connection, at most `max_connections` at a time.
///
/// Connections arriving while every slot is taken are closed immediately
/// without a response; the server itself keeps running.
#[derive(Debug)]
pub struct Dispatcher<F = LocalFs> {
    ctx: Arc<ServerContext<F>>,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl<F: FileSystem> Dispatcher<F> {
    /// Creates a dispatcher with `max_connections` session slots.
    pub fn new(ctx: Arc<ServerContext<F>>, max_connections: usize) -> Self {
        Self {
            ctx,
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Ceiling on concurrently running sessions.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of sessions currently running.
    pub fn active(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Starts serving `stream` on a new task and returns without waiting for it.
    pub fn dispatch<S>(&self, stream: S, peer: SocketAddr) -> Admission
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let Ok(slot) = Arc::clone(&self.slots).try_acquire_owned() else {
            warn!(
                peer = %peer,
                max_connections = self.max_connections,
                "connection limit reached, rejecting"
            );
            drop(stream);
            return Admission::Rejected;
        };

        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move {
            let _slot = slot;
            match serve_connection(stream, peer, ctx).await {
                Ok(summary) => debug!(
                    peer = %peer,
                    requests = summary.requests,
                    end = ?summary.end,
                    "session finished"
                ),
                Err(e) => warn!(peer = %peer, error = %e, "connection closed with error"),
            }
        });

        Admission::Accepted(handle)
    }
}

/// The listening socket.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use htserve::http::ContentTypeRegistry;
/// use htserve::server::{Dispatcher, Server, ServerContext};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let ctx = ServerContext::new("htdocs", ContentTypeRegistry::new(), Duration::from_secs(5));
///     let dispatcher = Dispatcher::new(Arc::new(ctx), 256);
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(dispatcher).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections and dispatches them until the task is cancelled.
    ///
    /// Failed accepts are logged and skipped; they never stop the loop.
    pub async fn run<F: FileSystem>(self, dispatcher: Dispatcher<F>) -> Result<(), ServerError> {
        info!(
            address = %self.local_addr,
            root = %dispatcher.ctx.document_root().display(),
            max_connections = dispatcher.max_connections(),
            "htserve listening"
        );

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer_addr, error = %e, "could not set TCP_NODELAY");
            }
            let _admission = dispatcher.dispatch(stream, peer_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    fn dispatcher(max: usize) -> Dispatcher<MemoryFs> {
        let mut fs = MemoryFs::new();
        fs.insert("/www/index.html", "ok");
        let ctx = ServerContext::with_files(
            "/www",
            ContentTypeRegistry::new(),
            fs,
            Duration::from_secs(5),
        );
        Dispatcher::new(Arc::new(ctx), max)
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn rejects_beyond_ceiling_and_recovers() {
        let dispatcher = dispatcher(1);

        let (mut first, server) = duplex(1024);
        let admitted = dispatcher.dispatch(server, peer(1));
        assert!(admitted.is_accepted());
        assert_eq!(dispatcher.active(), 1);

        let (mut second, server) = duplex(1024);
        assert!(!dispatcher.dispatch(server, peer(2)).is_accepted());
        let mut buf = Vec::new();
        second.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());

        first
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        first.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        let Admission::Accepted(handle) = admitted else {
            unreachable!()
        };
        handle.await.unwrap();
        assert_eq!(dispatcher.active(), 0);

        let (_third, server) = duplex(1024);
        assert!(dispatcher.dispatch(server, peer(3)).is_accepted());
    }

    #[tokio::test]
    async fn bind_error_names_address() {
        let taken = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().to_string();
        let err = Server::bind(&addr).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { addr: ref a, .. } if *a == addr));
    }
}
