//! # cachet
//!
//! Read-through HTTP response caching with TTL expiry and pluggable
//! backends, on a minimal async HTTP/1.1 server.
//!
//! The cache is explicit composition, not annotation: wrap a route
//! handler with [`cache::ResponseCache::wrap`] and register the result
//! like any other handler. Hits are served from the backend with
//! freshness metadata; misses run the handler once and store the
//! response for the configured TTL. Failures are never cached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cachet::{Response, Router, StatusCode, server::Server};
//! use cachet::cache::{MemoryBackend, ResponseCache};
//! use cachet::context::Context;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = ResponseCache::new(Arc::new(MemoryBackend::new()), "demo-cache")?;
//!
//!     let mut router = Router::new();
//!     router.get(
//!         "/customer/:pk",
//!         cache.wrap("customer.get", Duration::from_secs(10), |ctx: Context| async move {
//!             let pk = ctx.params().get("pk").unwrap_or("").to_owned();
//!             Response::new(StatusCode::Ok).body(pk)
//!         })?,
//!     );
//!
//!     let router = Arc::new(router);
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.run(move |req| {
//!         let router = Arc::clone(&router);
//!         async move { router.route(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
