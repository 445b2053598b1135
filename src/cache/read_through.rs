//! The read-through protocol: wrap a handler so its responses are cached.
//!
//! [`ResponseCache::wrap`] takes an operation id, a TTL, and a handler,
//! and returns a handler implementing the protocol:
//!
//! 1. derive the cache key from the request's path and query parameters;
//! 2. look the key up in the backend — on a fresh hit, decode and serve
//!    it with `X-Cache: HIT` and the remaining TTL as `Cache-Control`;
//! 3. on a miss, invoke the wrapped handler exactly once;
//! 4. never store a non-success response;
//! 5. on success, encode and store the entry with the configured TTL —
//!    a store failure is logged and the fresh response returned anyway.
//!
//! Stale or undecodable hits are treated as misses and recomputed.
//!
//! ## Concurrency
//!
//! No in-process lock serializes requests for the same key. If N requests
//! miss concurrently, all N invoke the wrapped handler and the last
//! successful store wins — acceptable for a best-effort, short-TTL cache
//! over idempotent reads. Per-key in-flight coalescing (single-flight) is
//! a deliberate extension point, not implemented here.
//!
//! Populate runs in the caller's own task, after the handler completes.
//! A canceled request drops the whole future, so nothing is stored on
//! behalf of a caller that went away.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::backend::{BackendError, CacheBackend};
use super::coder::{CacheEntry, Coder};
use super::key::KeyBuilder;
use crate::context::Context;
use crate::http::{Response, StatusCode};
use crate::router::{Handler, IntoHandler};

/// What the cache does when its backend is unreachable.
///
/// Chosen once per [`ResponseCache`]; the tradeoff is explicit rather
/// than implied. Cache *writes* are unaffected — they are always
/// non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Skip the cache, execute the wrapped handler directly, log a
    /// warning. The right default for a best-effort cache.
    #[default]
    FailOpen,
    /// Answer `503 Service Unavailable` without invoking the handler.
    FailClosed,
}

/// Configuration mistakes caught when a cache or wrapper is built,
/// not at request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheConfigError {
    #[error("cache TTL must be positive; zero is rejected, not clamped")]
    ZeroTtl,

    #[error("cache namespace must not be empty")]
    EmptyNamespace,

    #[error("cache operation id must not be empty")]
    EmptyOperation,
}

/// A read-through response cache bound to one backend and one namespace.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use cachet::{Router, Response, StatusCode};
/// use cachet::cache::{MemoryBackend, ResponseCache};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = ResponseCache::new(Arc::new(MemoryBackend::new()), "demo-cache")?;
///
/// let mut router = Router::new();
/// router.get(
///     "/customer/:pk",
///     cache.wrap("customer.get", Duration::from_secs(10), |_ctx| async {
///         Response::new(StatusCode::Ok).body("...")
///     })?,
/// );
/// # Ok(())
/// # }
/// ```
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    keys: KeyBuilder,
    policy: FailurePolicy,
}

impl ResponseCache {
    /// Creates a cache over `backend`, prefixing every key with
    /// `namespace`.
    ///
    /// # Errors
    ///
    /// [`CacheConfigError::EmptyNamespace`] — the namespace is mandatory;
    /// unrelated cache users sharing a backend are isolated by it.
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        namespace: impl Into<String>,
    ) -> Result<Self, CacheConfigError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(CacheConfigError::EmptyNamespace);
        }
        Ok(Self {
            backend,
            keys: KeyBuilder::new(namespace),
            policy: FailurePolicy::default(),
        })
    }

    /// Sets the degradation policy for backend outages.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the configured degradation policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Returns the key builder this cache derives keys with.
    pub fn key_builder(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Removes every entry in this cache's namespace; returns the count.
    ///
    /// # Errors
    ///
    /// Propagates [`BackendError`] from the backend.
    pub async fn clear(&self) -> Result<u64, BackendError> {
        self.backend.clear(&self.keys.prefix()).await
    }

    /// Wraps `handler` with the read-through protocol.
    ///
    /// `operation` identifies the logical endpoint and must be stable
    /// across processes (it is part of every derived key). `ttl` is how
    /// long a stored response stays fresh.
    ///
    /// Requests with non-safe methods (anything but GET/HEAD/OPTIONS)
    /// bypass the cache entirely and reach the handler directly.
    ///
    /// # Errors
    ///
    /// [`CacheConfigError::ZeroTtl`] or
    /// [`CacheConfigError::EmptyOperation`] — rejected here, at
    /// configuration time, never at request time.
    pub fn wrap(
        &self,
        operation: &str,
        ttl: Duration,
        handler: impl IntoHandler,
    ) -> Result<CachedHandler, CacheConfigError> {
        if operation.is_empty() {
            return Err(CacheConfigError::EmptyOperation);
        }
        if ttl.is_zero() {
            return Err(CacheConfigError::ZeroTtl);
        }

        let shared = Arc::new(WrapState {
            backend: Arc::clone(&self.backend),
            keys: self.keys.clone(),
            policy: self.policy,
            operation: operation.to_owned(),
            ttl,
            handler: handler.into_handler(),
        });

        let inner: Handler = Arc::new(move |ctx| {
            let shared = Arc::clone(&shared);
            Box::pin(async move { shared.execute(ctx).await })
        });

        Ok(CachedHandler { inner })
    }
}

/// A handler produced by [`ResponseCache::wrap`], ready to register on a
/// [`Router`](crate::Router).
#[derive(Clone)]
pub struct CachedHandler {
    inner: Handler,
}

impl IntoHandler for CachedHandler {
    fn call(&self, ctx: Context) -> std::pin::Pin<Box<dyn Future<Output = Response> + Send>> {
        (self.inner)(ctx)
    }

    fn into_handler(self) -> Handler {
        self.inner
    }
}

// Everything one wrapped handler needs, shared across its invocations.
struct WrapState {
    backend: Arc<dyn CacheBackend>,
    keys: KeyBuilder,
    policy: FailurePolicy,
    operation: String,
    ttl: Duration,
    handler: Handler,
}

impl WrapState {
    async fn execute(&self, ctx: Context) -> Response {
        if !ctx.request().method().is_safe() {
            return (self.handler)(ctx).await;
        }

        let key = self.derive_key(&ctx);

        match self.backend.get(&key).await {
            Ok(Some(blob)) => match Coder::decode(&blob) {
                Ok(entry) => {
                    let now = Utc::now().timestamp();
                    if entry.is_expired(now) {
                        debug!(key = %key, "cached entry stale — recomputing");
                    } else {
                        let remaining = entry.remaining_ttl(now);
                        match entry.into_response() {
                            Ok(mut response) => {
                                debug!(key = %key, remaining, "cache hit");
                                response.add_header("X-Cache", "HIT");
                                response
                                    .add_header("Cache-Control", format!("max-age={remaining}"));
                                return response;
                            }
                            Err(e) => {
                                warn!(key = %key, error = %e, "cached entry unusable — recomputing");
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "cached entry corrupt — recomputing");
                }
            },
            Ok(None) => {}
            Err(e) => return self.degrade(ctx, &key, &e).await,
        }

        self.compute_and_populate(ctx, key).await
    }

    // Backend outage path. Which way it degrades is configuration, not
    // accident.
    async fn degrade(&self, ctx: Context, key: &str, cause: &BackendError) -> Response {
        match self.policy {
            FailurePolicy::FailOpen => {
                warn!(key = %key, error = %cause, "cache backend unavailable — serving uncached");
                let mut response = (self.handler)(ctx).await;
                response.add_header("X-Cache", "BYPASS");
                response
            }
            FailurePolicy::FailClosed => {
                error!(key = %key, error = %cause, "cache backend unavailable — failing closed");
                Response::new(StatusCode::ServiceUnavailable).body("cache backend unavailable")
            }
        }
    }

    async fn compute_and_populate(&self, ctx: Context, key: String) -> Response {
        let mut response = (self.handler)(ctx).await;

        // Failures are never cached: a 404 today must not shadow a record
        // created a second later.
        if !response.status().is_success() {
            response.add_header("X-Cache", "MISS");
            return response;
        }

        let entry = CacheEntry::from_response(&response, Utc::now().timestamp(), self.ttl.as_secs());
        match Coder::encode(&entry) {
            Ok(blob) => {
                if let Err(e) = self.backend.set(&key, blob, self.ttl).await {
                    warn!(key = %key, error = %e, "cache populate failed — serving fresh result");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache encode failed — serving fresh result");
            }
        }

        response.add_header("X-Cache", "MISS");
        response
    }

    // Key arguments are the router's path captures plus all query
    // parameters, canonicalized by the key builder. Headers never
    // participate.
    fn derive_key(&self, ctx: &Context) -> String {
        let mut args: Vec<(&str, Option<&str>)> = Vec::new();
        for (name, value) in ctx.params().iter() {
            args.push((name, Some(value)));
        }
        for (name, value) in ctx.request().query_params() {
            args.push((name, Some(value)));
        }
        self.keys.build(&self.operation, args)
    }
}
