//! HTTP/1.x protocol types, parsing and response assembly.
//!
//! This module provides the core HTTP primitives used by a connection
//! session: [`Method`], [`StatusCode`], [`Headers`], the request parser
//! ([`request::parse`]), the response writer ([`response::send_response`]) and
//! the extension → content-type table ([`ContentTypeRegistry`]).

use std::fmt;

pub mod headers;
pub mod mime;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use mime::ContentTypeRegistry;
pub use request::{ParseOutcome, Request};
pub use response::send_response;

/// An HTTP response status code.
///
/// Only the statuses this server can emit are modelled.
///
/// # Examples
///
/// ```
/// use htserve::http::StatusCode;
///
/// let status = StatusCode::NotFound;
/// assert_eq!(status.as_u16(), 404);
/// assert_eq!(status.canonical_reason(), "Not Found");
/// assert_eq!(status.to_string(), "404 Not Found");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,

    // 4xx Client Error
    BadRequest = 400,
    NotFound = 404,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    HttpVersionNotSupported = 505,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// A request method this server answers.
///
/// Anything else on the request line is rejected by the parser before a
/// `Method` is ever constructed.
///
/// # Examples
///
/// ```
/// use htserve::http::Method;
///
/// let method: Method = "HEAD".parse().unwrap();
/// assert_eq!(method, Method::Head);
/// assert!("get".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Transfer the file.
    Get,
    /// Identical to GET but without a response body.
    Head,
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }

    /// Returns `true` if a response to this method carries the file body.
    pub fn sends_body(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method token is not `GET` or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

impl std::str::FromStr for Method {
    type Err = UnsupportedMethod;

    // Case-sensitive: `get` is not a method.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            other => Err(UnsupportedMethod(other.to_owned())),
        }
    }
}
