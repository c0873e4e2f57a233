//! Request-head parsing and validation.
//!
//! [`parse`] never fails: every byte sequence maps to a [`ParseOutcome`],
//! either a usable [`Request`] or the status to reject it with.

use super::{ContentTypeRegistry, Method, StatusCode};

/// The blank line that terminates a request head.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// The document served for the root URL.
pub const INDEX_PATH: &str = "/index.html";

/// A validated GET or HEAD request.
///
/// Created by [`parse`] and consumed by the response writer; nothing about
/// it outlives the exchange it belongs to.
///
/// # Examples
///
/// ```
/// use htserve::http::{ContentTypeRegistry, Method, request};
///
/// let registry = ContentTypeRegistry::new();
/// let raw = b"GET /css/site.css HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let outcome = request::parse(raw, &registry);
/// let req = outcome.request().unwrap();
///
/// assert_eq!(req.method(), Method::Get);
/// assert_eq!(req.target_path(), "/css/site.css");
/// assert_eq!(req.content_type(), "text/css");
/// assert!(!req.is_keep_alive());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target_path: String,
    content_type: String,
    keep_alive: bool,
}

impl Request {
    /// Builds a request for `url`, resolving the served path and its content type.
    ///
    /// `/` is served as [`INDEX_PATH`]; every other URL is used verbatim. The
    /// content type comes from the text after the last `.` of the URL, or the
    /// registry fallback when there is none.
    pub fn new(
        method: Method,
        url: &str,
        keep_alive: bool,
        registry: &ContentTypeRegistry,
    ) -> Self {
        let (target_path, extension) = if url == "/" {
            (INDEX_PATH, "html")
        } else {
            let extension = url.rfind('.').map_or("", |dot| &url[dot + 1..]);
            (url, extension)
        };

        Self {
            method,
            target_path: target_path.to_owned(),
            content_type: registry.lookup(extension).to_owned(),
            keep_alive,
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the server-relative path of the requested file (always `/`-rooted
    /// for well-formed URLs).
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Returns the content type chosen from the URL's extension.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns `true` if the client sent `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }
}

/// Result of validating one request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The request is valid and can be served.
    Ok(Request),
    /// The request is rejected with `status`.
    ///
    /// `keep_alive` still reflects the headers, so the connection may outlive
    /// a rejected request.
    Rejected { status: StatusCode, keep_alive: bool },
}

impl ParseOutcome {
    /// The status the response to this outcome starts from.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Ok(_) => StatusCode::Ok,
            Self::Rejected { status, .. } => *status,
        }
    }

    /// Returns `true` if the connection stays open after the response.
    pub fn is_keep_alive(&self) -> bool {
        match self {
            Self::Ok(req) => req.is_keep_alive(),
            Self::Rejected { keep_alive, .. } => *keep_alive,
        }
    }

    /// Returns the parsed request, or `None` if it was rejected.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Ok(req) => Some(req),
            Self::Rejected { .. } => None,
        }
    }
}

/// Returns the length of the request head in `buf`, terminator included, or
/// `None` while the blank line has not arrived yet.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Parses and validates a request head.
///
/// Precedence of rejections:
///
/// 1. no `Host:` header, a request line with fewer than three tokens, or a
///    method other than `GET`/`HEAD` → `400 Bad Request`;
/// 2. a version not starting with `HTTP/1.0` or `HTTP/1.1` → `505`.
///
/// Header lines are scanned regardless of the request line, so the
/// keep-alive flag is known for rejected requests too. Unsupported but
/// well-formed methods are treated exactly like malformed request lines.
pub fn parse(buf: &[u8], registry: &ContentTypeRegistry) -> ParseOutcome {
    let text = String::from_utf8_lossy(buf);
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .skip_while(|line| line.is_empty());

    let request_line = lines.next().unwrap_or_default();

    let mut host_present = false;
    let mut keep_alive = false;
    for line in lines {
        if line.starts_with("Host:") {
            host_present = true;
        } else if line.trim_end() == "Connection: keep-alive" {
            keep_alive = true;
        }
    }

    let reject = |status| ParseOutcome::Rejected { status, keep_alive };

    if !host_present {
        return reject(StatusCode::BadRequest);
    }

    let mut tokens = request_line.split_whitespace();
    let (Some(method), Some(url), Some(version)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return reject(StatusCode::BadRequest);
    };

    let Ok(method) = method.parse::<Method>() else {
        return reject(StatusCode::BadRequest);
    };

    if !(version.starts_with("HTTP/1.0") || version.starts_with("HTTP/1.1")) {
        return reject(StatusCode::HttpVersionNotSupported);
    }

    ParseOutcome::Ok(Request::new(method, url, keep_alive, registry))
}
