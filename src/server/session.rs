//! One accepted connection, from first read to close.
//!
//! ```text
//!   AwaitingRequest ──Complete──▶ Parsing ──▶ Responding ──▶ Idle
//!        │  ▲                                                 │
//!        │  └──────────────── keep-alive ─────────────────────┤
//!        │                                                    │
//!        └── Timeout / Closed / Error ──▶ Closed ◀── close ────┘
//! ```
//!
//! Requests on a connection are strictly sequential: the next request is
//! read only after the previous response has been written in full, and any
//! bytes received past a request head are discarded.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::debug;

use super::ServerContext;
use crate::fs::FileSystem;
use crate::http::request::{self, ParseOutcome};
use crate::http::response::{SendError, send_response};

/// Capacity of the per-connection read buffer; a request head must fit in it.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Conditions that end a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error while reading request: {0}")]
    Io(#[from] io::Error),

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("peer closed the connection mid-request after {received} bytes")]
    Truncated { received: usize },

    #[error(transparent)]
    Send(#[from] SendError),
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A response without keep-alive was sent.
    Completed,
    /// The peer closed the connection between requests.
    PeerClosed,
    /// No complete request arrived before the deadline. Nothing was sent.
    TimedOut,
}

/// Summary returned by [`serve_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub requests: usize,
}

/// Result of waiting for one request head.
#[derive(Debug)]
enum ReadOutcome {
    /// A head of this many bytes sits at the start of the buffer.
    Complete(usize),
    Timeout,
    Closed,
    Error(SessionError),
}

enum State {
    AwaitingRequest,
    Parsing(usize),
    Responding(ParseOutcome),
    Idle { keep_alive: bool },
}

struct ConnectionSession<S, F> {
    stream: S,
    peer: SocketAddr,
    ctx: Arc<ServerContext<F>>,
    buf: BytesMut,
    requests: usize,
}

/// Serves every request on `stream` until the session ends, then closes it.
///
/// The stream is shut down and dropped on every exit path, including
/// errors. The returned error, if any, concerns this connection only.
pub async fn serve_connection<S, F>(
    stream: S,
    peer: SocketAddr,
    ctx: Arc<ServerContext<F>>,
) -> Result<SessionSummary, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FileSystem,
{
    let mut session = ConnectionSession {
        stream,
        peer,
        ctx,
        buf: BytesMut::with_capacity(MAX_HEAD_SIZE),
        requests: 0,
    };

    let result = session.run().await;
    session.close().await;

    result.map(|end| SessionSummary {
        end,
        requests: session.requests,
    })
}

impl<S, F> ConnectionSession<S, F>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FileSystem,
{
    async fn run(&mut self) -> Result<SessionEnd, SessionError> {
        let mut state = State::AwaitingRequest;

        loop {
            state = match state {
                State::AwaitingRequest => {
                    let deadline = Instant::now() + self.ctx.timeout();
                    match self.read_request(deadline).await {
                        ReadOutcome::Complete(len) => State::Parsing(len),
                        ReadOutcome::Timeout => {
                            debug!(peer = %self.peer, "request timed out");
                            return Ok(SessionEnd::TimedOut);
                        }
                        ReadOutcome::Closed => return Ok(SessionEnd::PeerClosed),
                        ReadOutcome::Error(e) => return Err(e),
                    }
                }

                State::Parsing(len) => {
                    State::Responding(request::parse(&self.buf[..len], self.ctx.registry()))
                }

                State::Responding(outcome) => {
                    let keep_alive = outcome.is_keep_alive();
                    let status = send_response(
                        &mut self.stream,
                        &outcome,
                        self.ctx.document_root(),
                        self.ctx.files(),
                        self.ctx.timeout(),
                    )
                    .await?;
                    self.requests += 1;

                    debug!(
                        peer = %self.peer,
                        status = %status,
                        path = outcome.request().map_or("-", |r| r.target_path()),
                        keep_alive,
                        "response sent"
                    );
                    State::Idle { keep_alive }
                }

                State::Idle { keep_alive: true } => {
                    self.buf.clear();
                    State::AwaitingRequest
                }

                State::Idle { keep_alive: false } => return Ok(SessionEnd::Completed),
            };
        }
    }

    /// Reads until the buffer holds a complete request head.
    ///
    /// Never reads more than [`MAX_HEAD_SIZE`] bytes in total.
    async fn read_request(&mut self, deadline: Instant) -> ReadOutcome {
        loop {
            if let Some(len) = request::head_len(&self.buf) {
                return ReadOutcome::Complete(len);
            }

            let room = MAX_HEAD_SIZE - self.buf.len();
            if room == 0 {
                return ReadOutcome::Error(SessionError::HeadTooLarge {
                    limit: MAX_HEAD_SIZE,
                });
            }

            let mut window = (&mut self.buf).limit(room);
            let read = tokio::time::timeout_at(deadline, self.stream.read_buf(&mut window));

            match read.await {
                Err(_elapsed) => return ReadOutcome::Timeout,
                Ok(Ok(0)) if self.buf.is_empty() => return ReadOutcome::Closed,
                Ok(Ok(0)) => {
                    return ReadOutcome::Error(SessionError::Truncated {
                        received: self.buf.len(),
                    });
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return ReadOutcome::Error(e.into()),
            }
        }
    }

    async fn close(&mut self) {
        // Best effort; the stream is released on drop either way.
        let _ = tokio::time::timeout(self.ctx.timeout(), self.stream.shutdown()).await;
        debug!(peer = %self.peer, requests = self.requests, "connection closed");
    }
}
