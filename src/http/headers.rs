//! Ordered response header block.
//!
//! Response headers are emitted in the exact order they were appended, which
//! is how the fixed `Connection`, `Date`, `Last-Modified`, `Content-Length`,
//! `Content-Type` sequence is kept stable on the wire.

use std::fmt;

/// An insertion-ordered list of header fields.
///
/// # Examples
///
/// ```
/// use htserve::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Connection", "close");
/// headers.insert("Content-Length", "12");
///
/// assert_eq!(headers.len(), 2);
/// assert_eq!(headers.to_string(), "Connection: close\r\nContent-Length: 12\r\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(&'static str, String)>,
}

impl Headers {
    /// Creates an empty header block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header block with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header field after all existing ones.
    pub fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        self.inner.push((name, value.into()));
    }

    /// Returns the number of header fields.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no field has been inserted.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
