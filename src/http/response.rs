//! Response assembly and transmission.
//!
//! A response is planned first ([`Response::plan`]): the parse outcome fixes
//! the initial status, and for valid requests the filesystem decides between
//! `200` with a file body and `404`. The header block is then written in one
//! call, followed by the file bytes for GET.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::{Headers, Method, ParseOutcome, StatusCode};
use crate::fs::{self, FileMetadata, FileSystem};

/// Size of each chunk read from a file and written to the connection.
pub const CHUNK_SIZE: usize = 8 * 1024;

// 9999-12-31T23:59:59Z
const LATEST_HTTP_DATE: Duration = Duration::from_secs(253_402_300_799);

/// Failures while writing a response. All of them end the connection.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("timed out after {0:?} writing to the connection")]
    Timeout(Duration),

    #[error("I/O error while sending response: {0}")]
    Io(#[from] io::Error),

    #[error("file ended after {sent} of {expected} announced bytes")]
    ShortBody { sent: u64, expected: u64 },
}

/// The file half of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBody {
    pub path: PathBuf,
    pub metadata: FileMetadata,
    pub content_type: String,
    pub method: Method,
}

/// A planned response: status line, connection disposition and optional file.
///
/// # Examples
///
/// ```
/// use std::time::SystemTime;
/// use htserve::http::{StatusCode, response::Response};
///
/// let response = Response::without_file(StatusCode::BadRequest, false);
/// let head = response.head(SystemTime::UNIX_EPOCH);
/// assert_eq!(
///     &head[..],
///     &b"HTTP/1.1 400 Bad Request\r\n\
///        Connection: close\r\n\
///        Date: Thu, 01 Jan 1970 00:00:00 GMT\r\n\r\n"[..]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    keep_alive: bool,
    file: Option<FileBody>,
}

impl Response {
    /// A response that carries no file, and therefore no body.
    pub fn without_file(status: StatusCode, keep_alive: bool) -> Self {
        Self {
            status,
            keep_alive,
            file: None,
        }
    }

    /// Decides the response for `outcome`.
    ///
    /// Only successfully parsed requests touch the filesystem. A target with
    /// no regular file behind it (or one escaping `document_root`) becomes
    /// `404`; a metadata error other than absence becomes `500`.
    pub async fn plan<F: FileSystem>(
        outcome: &ParseOutcome,
        document_root: &Path,
        files: &F,
    ) -> Self {
        let keep_alive = outcome.is_keep_alive();
        let Some(request) = outcome.request() else {
            return Self::without_file(outcome.status(), keep_alive);
        };

        let Some(path) = fs::resolve(document_root, request.target_path()) else {
            return Self::without_file(StatusCode::NotFound, keep_alive);
        };

        match files.metadata(&path).await {
            Ok(Some(metadata)) => Self {
                status: StatusCode::Ok,
                keep_alive,
                file: Some(FileBody {
                    path,
                    metadata,
                    content_type: request.content_type().to_owned(),
                    method: request.method(),
                }),
            },
            Ok(None) => Self::without_file(StatusCode::NotFound, keep_alive),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "metadata lookup failed");
                Self::without_file(StatusCode::InternalServerError, keep_alive)
            }
        }
    }

    /// Returns the status line's code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns `true` if the connection stays open after this response.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns the file backing a `200` response, if any.
    pub fn file(&self) -> Option<&FileBody> {
        self.file.as_ref()
    }

    /// Header fields in wire order, `Date` stamped with `now`.
    ///
    /// `Last-Modified`, `Content-Length` and `Content-Type` appear only when a
    /// file backs the response; error responses carry none of them.
    pub fn headers(&self, now: SystemTime) -> Headers {
        let mut headers = Headers::with_capacity(5);
        headers.insert(
            "Connection",
            if self.keep_alive { "keep-alive" } else { "close" },
        );
        headers.insert("Date", http_date(now));

        if let Some(file) = &self.file {
            headers.insert("Last-Modified", http_date(file.metadata.modified));
            headers.insert("Content-Length", file.metadata.size.to_string());
            headers.insert("Content-Type", file.content_type.as_str());
        }
        headers
    }

    /// Serializes the status line and header block, blank line included.
    pub fn head(&self, now: SystemTime) -> BytesMut {
        let headers = self.headers(now);
        let mut buf = BytesMut::with_capacity(64 + headers.len() * 48);
        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        buf.put(headers.to_string().as_bytes());
        buf.put(&b"\r\n"[..]);
        buf
    }

    /// Writes the response to `stream`.
    ///
    /// Every individual write is bounded by `write_timeout`. For GET the file
    /// is streamed in [`CHUNK_SIZE`] pieces; exactly `Content-Length` bytes
    /// are sent or the call fails.
    pub async fn send<S, F>(
        &self,
        stream: &mut S,
        files: &F,
        write_timeout: Duration,
    ) -> Result<(), SendError>
    where
        S: AsyncWrite + Unpin,
        F: FileSystem,
    {
        let head = self.head(SystemTime::now());
        write_within(stream, &head, write_timeout).await?;

        if let Some(file) = self.file.as_ref().filter(|f| f.method.sends_body()) {
            stream_file(stream, files, file, write_timeout).await?;
        }

        match tokio::time::timeout(write_timeout, stream.flush()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SendError::Timeout(write_timeout)),
        }
    }
}

/// Plans and sends the response to `outcome`, returning the status sent.
pub async fn send_response<S, F>(
    stream: &mut S,
    outcome: &ParseOutcome,
    document_root: &Path,
    files: &F,
    write_timeout: Duration,
) -> Result<StatusCode, SendError>
where
    S: AsyncWrite + Unpin,
    F: FileSystem,
{
    let response = Response::plan(outcome, document_root, files).await;
    response.send(stream, files, write_timeout).await?;
    Ok(response.status())
}

async fn stream_file<S, F>(
    stream: &mut S,
    files: &F,
    file: &FileBody,
    write_timeout: Duration,
) -> Result<(), SendError>
where
    S: AsyncWrite + Unpin,
    F: FileSystem,
{
    let expected = file.metadata.size;
    let mut reader = files.open(&file.path).await?.take(expected);
    let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);
    let mut sent = 0u64;

    loop {
        chunk.clear();
        let n = reader.read_buf(&mut chunk).await?;
        if n == 0 {
            break;
        }
        write_within(stream, &chunk, write_timeout).await?;
        sent += n as u64;
    }

    if sent < expected {
        return Err(SendError::ShortBody { sent, expected });
    }
    Ok(())
}

/// Formats `time` as an IMF-fixdate, clamped to the range the format can
/// express (1970 through 9999).
fn http_date(time: SystemTime) -> String {
    let since_epoch = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .min(LATEST_HTTP_DATE);
    httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + since_epoch)
}

async fn write_within<S>(stream: &mut S, bytes: &[u8], limit: Duration) -> Result<(), SendError>
where
    S: AsyncWrite + Unpin,
{
    match tokio::time::timeout(limit, stream.write_all(bytes)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SendError::Timeout(limit)),
    }
}
