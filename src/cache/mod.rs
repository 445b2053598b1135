//! Read-through response caching with TTL expiry and pluggable backends.
//!
//! The pieces, smallest first:
//!
//! - [`KeyBuilder`] — deterministic derivation of a namespaced cache key
//!   from an operation id and its effective arguments.
//! - [`Coder`] / [`CacheEntry`] — reversible mapping between a response
//!   (status + preserved headers + body) and the single byte blob a
//!   backend stores.
//! - [`CacheBackend`] — the storage contract (`get`/`set`/`clear`),
//!   implemented by [`MemoryBackend`] and [`RedisBackend`].
//! - [`ResponseCache`] — the read-through core: wraps a route handler so
//!   that hits are served from the backend and misses compute, populate,
//!   and return.
//!
//! ## Degradation policy
//!
//! A backend outage is a [`BackendError`], never silently a miss. What
//! happens next is explicit configuration ([`FailurePolicy`]): fail-open
//! (default) skips the cache and executes the wrapped handler directly,
//! logging a warning; fail-closed answers `503 Service Unavailable`.
//! Cache *write* failures are always non-fatal — a freshly computed
//! response is returned to the caller even when it could not be stored.
//!
//! ## What is never cached
//!
//! Non-success responses. A `404` from the wrapped handler passes through
//! untouched, and the next identical request computes again.

pub mod backend;
pub mod coder;
pub mod key;
pub mod read_through;
pub mod redis;

pub use backend::{BackendError, CacheBackend, MemoryBackend};
pub use coder::{CacheEntry, Coder, CodecError, PRESERVED_HEADERS};
pub use key::KeyBuilder;
pub use read_through::{CacheConfigError, CachedHandler, FailurePolicy, ResponseCache};
pub use redis::RedisBackend;
