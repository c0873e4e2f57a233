//! # htserve
//!
//! A small async HTTP/1.x server that answers GET and HEAD requests for files
//! under a document root, with keep-alive and per-connection timeouts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use htserve::{ContentTypeRegistry, Dispatcher, Server, ServerContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ServerContext::new("./public", ContentTypeRegistry::new(), Duration::from_secs(5));
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(Dispatcher::new(Arc::new(ctx), 128)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fs;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{Cli, ConfigError, ServerConfig};
pub use http::{ContentTypeRegistry, Method, ParseOutcome, Request, StatusCode};
pub use server::{
    Admission, Dispatcher, Server, ServerContext, ServerError, SessionEnd, SessionError,
    serve_connection,
};
