//! File extension → `Content-Type` lookup.

use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Content type returned for extensions the registry does not know.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
];

/// Maps file extensions to MIME types.
///
/// Built once at startup and shared read-only between all sessions. Lookups
/// never fail: unknown extensions resolve to [`DEFAULT_CONTENT_TYPE`].
///
/// # Examples
///
/// ```
/// use htserve::http::ContentTypeRegistry;
///
/// let registry = ContentTypeRegistry::new();
/// assert_eq!(registry.lookup("html"), "text/html");
/// assert_eq!(registry.lookup("PNG"), "image/png");
/// assert_eq!(registry.lookup("nope"), "application/octet-stream");
/// ```
#[derive(Debug, Clone)]
pub struct ContentTypeRegistry {
    types: HashMap<String, String>,
}

impl ContentTypeRegistry {
    /// Creates a registry holding the built-in extension table.
    pub fn new() -> Self {
        let types = BUILTIN
            .iter()
            .map(|(ext, mime)| ((*ext).to_owned(), (*mime).to_owned()))
            .collect();
        Self { types }
    }

    /// Creates the built-in registry and extends it with a `mime.types` file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn with_mime_types_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut registry = Self::new();
        registry.extend_from_mime_types(&contents);
        Ok(registry)
    }

    /// Adds entries from text in the Apache/nginx `mime.types` layout:
    /// `type/subtype ext1 ext2 ...` per line, `#` starting a comment.
    ///
    /// Entries override built-in ones. Returns the number of extensions added.
    pub fn extend_from_mime_types(&mut self, contents: &str) -> usize {
        let mut added = 0;
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let Some(mime) = fields.next() else {
                continue;
            };
            for ext in fields {
                let ext = ext.trim_end_matches(';').to_ascii_lowercase();
                if !ext.is_empty() {
                    self.types.insert(ext, mime.to_owned());
                    added += 1;
                }
            }
        }
        added
    }

    /// Returns the content type for `extension` (without the leading dot).
    pub fn lookup(&self, extension: &str) -> &str {
        self.types
            .get(extension)
            .or_else(|| self.types.get(&extension.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

impl Default for ContentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookups() {
        let r = ContentTypeRegistry::new();
        assert_eq!(r.lookup("html"), "text/html");
        assert_eq!(r.lookup("jpg"), "image/jpeg");
        assert_eq!(r.lookup("css"), "text/css");
    }

    #[test]
    fn unknown_and_empty_fall_back() {
        let r = ContentTypeRegistry::new();
        assert_eq!(r.lookup("exe"), DEFAULT_CONTENT_TYPE);
        assert_eq!(r.lookup(""), DEFAULT_CONTENT_TYPE);
        assert_eq!(r.lookup("b/c"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn mime_types_file_format() {
        let mut r = ContentTypeRegistry::new();
        let added = r.extend_from_mime_types(
            "# comment line\n\
             application/x-custom   cst cust\n\
             \n\
             text/plain txt; # trailing comment\n\
             application/no-extensions\n",
        );
        assert_eq!(added, 3);
        assert_eq!(r.lookup("cst"), "application/x-custom");
        assert_eq!(r.lookup("cust"), "application/x-custom");
        assert_eq!(r.lookup("txt"), "text/plain");
    }

    #[test]
    fn file_entries_override_builtins() {
        let mut r = ContentTypeRegistry::new();
        assert_eq!(r.lookup("html"), "text/html");
        r.extend_from_mime_types("application/xhtml+xml HTML\n");
        assert_eq!(r.lookup("html"), "application/xhtml+xml");
    }
}
