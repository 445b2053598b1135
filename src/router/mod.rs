//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! This module provides [`Router`], which dispatches incoming HTTP requests
//! to handler functions based on the request method and URL path. Two
//! pattern styles are supported:
//!
//! | Pattern          | Example match    | Captured params |
//! |------------------|------------------|-----------------|
//! | `/customers`     | `/customers`     | *(none)*        |
//! | `/customer/:pk`  | `/customer/42`   | `pk → "42"`     |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so
//! `/customers/` and `/customers` are treated as equivalent.
//!
//! Routes are matched in registration order; the first route whose method
//! and pattern both match the incoming request wins.
//!
//! Handlers are plain async functions. To cache a route, wrap its handler
//! with [`crate::cache::ResponseCache::wrap`] before registering it — the
//! router neither knows nor cares that a handler consults a cache.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, Parameters};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`]
/// and returns a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and
/// shared across threads without copying the underlying closure.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the
/// blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;

    /// Erase the concrete type into a cloneable [`Handler`].
    fn into_handler(self) -> Handler
    where
        Self: Sized,
    {
        Arc::new(move |ctx| self.call(ctx))
    }
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    // Matches one exact path string, e.g. `/customers`.
    Exact(String),
    // Matches a fixed number of segments where some may be named captures,
    // e.g. `/customer/:pk`.
    Parameterized { segments: Vec<Segment> },
}

impl Pattern {
    // Parse a route pattern string. A trailing slash (other than on the
    // root `/`) is stripped before classification so that `/customers/`
    // and `/customers` compile to identical patterns.
    fn parse(pattern: &str) -> Self {
        let pattern = if pattern != "/" && pattern.ends_with('/') {
            &pattern[..pattern.len() - 1]
        } else {
            pattern
        };

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if let Some(p) = s.strip_prefix(':') {
                        Segment::Parameter(p.to_string())
                    } else {
                        Segment::Static(s.to_string())
                    }
                })
                .collect();

            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    // Try to match `path` against this pattern, returning extracted
    // [`Parameters`] on success.
    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = if path != "/" && path.ends_with('/') {
            &path[..path.len() - 1]
        } else {
            path
        };

        match self {
            Pattern::Exact(p) => {
                if p == path {
                    Some(Parameters::new())
                } else {
                    None
                }
            }
            Pattern::Parameterized { segments } => {
                let mut params = Parameters::new();
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

                if segments.len() != path_segments.len() {
                    return None;
                }

                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) => {
                            if s != path_seg {
                                return None;
                            }
                        }
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), path_seg.to_string());
                        }
                    }
                }

                Some(params)
            }
        }
    }
}

// A single registered route binding a method + pattern to a handler.
struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Handler) -> Self {
        Self {
            method,
            pattern: Pattern::parse(pattern),
            handler,
        }
    }

    // Returns `Some(params)` when both the HTTP method and path pattern
    // match, `None` otherwise.
    fn matches(&self, method: &Method, path: &str) -> Option<Parameters> {
        if &self.method == method {
            self.pattern.matches(path)
        } else {
            None
        }
    }
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// Routes are evaluated in registration order; the first route whose HTTP
/// method and path pattern both match the incoming request is used. When no
/// route matches, a `404 Not Found` response is returned automatically.
///
/// # Examples
///
/// ```rust,no_run
/// use cachet::{Router, Response, StatusCode};
/// use cachet::context::Context;
///
/// let mut router = Router::new();
///
/// router.get("/customers", |_ctx: Context| async { Response::new(StatusCode::Ok) });
///
/// router.get("/customer/:pk", |ctx: Context| async move {
///     let pk = ctx.params().get("pk").unwrap_or("unknown").to_owned();
///     Response::new(StatusCode::Ok).body(pk)
/// });
/// ```
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    ///
    /// # Arguments
    ///
    /// - `path` — URL pattern string (e.g. `"/customers"` or `"/customer/:pk"`).
    /// - `handler` — Async function that receives a [`Context`] and returns
    ///   a [`Response`]. A cache-wrapped handler (see
    ///   [`crate::cache::ResponseCache::wrap`]) registers the same way.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Register a handler for `PUT` requests matching `path`.
    pub fn put(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Put, path, handler);
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Delete, path, handler);
    }

    /// Register a handler for `PATCH` requests matching `path`.
    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Patch, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.routes.push(Route::new(method, path, handler.into_handler()));
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    ///
    /// Routes are tested in registration order. The first route whose HTTP
    /// method and path pattern both match wins. If no route matches, a
    /// `404 Not Found` response is returned.
    pub async fn route(&self, request: Request) -> Response {
        let path = request.path();

        for route in &self.routes {
            if let Some(params) = route.matches(request.method(), path) {
                let ctx = Context::with_params(request, params);
                return (route.handler)(ctx).await;
            }
        }

        Response::new(StatusCode::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Request;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    // ── Pattern ───────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_exact() {
        assert!(matches!(Pattern::parse("/customers"), Pattern::Exact(s) if s == "/customers"));
    }

    #[test]
    fn pattern_parse_trailing_slash_stripped() {
        assert!(matches!(Pattern::parse("/customers/"), Pattern::Exact(s) if s == "/customers"));
    }

    #[test]
    fn pattern_parse_parameterized() {
        let pat = Pattern::parse("/customer/:pk");
        match pat {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 2);
                assert!(matches!(&segments[0], Segment::Static(s) if s == "customer"));
                assert!(matches!(&segments[1], Segment::Parameter(s) if s == "pk"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn pattern_exact_match() {
        let pat = Pattern::parse("/customers");
        assert!(pat.matches("/customers").is_some());
        assert!(pat.matches("/customers/").is_some());
        assert!(pat.matches("/orders").is_none());
    }

    #[test]
    fn pattern_root_matches_only_root() {
        let pat = Pattern::parse("/");
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/other").is_none());
    }

    #[test]
    fn pattern_param_extracts_value() {
        let pat = Pattern::parse("/customer/:pk");
        let params = pat.matches("/customer/42").unwrap();
        assert_eq!(params.get("pk"), Some("42"));
    }

    #[test]
    fn pattern_param_multi_extracts_values() {
        let pat = Pattern::parse("/customer/:pk/orders/:order_id");
        let params = pat.matches("/customer/7/orders/99").unwrap();
        assert_eq!(params.get("pk"), Some("7"));
        assert_eq!(params.get("order_id"), Some("99"));
    }

    #[test]
    fn pattern_param_wrong_segment_count() {
        let pat = Pattern::parse("/customer/:pk");
        assert!(pat.matches("/customer").is_none());
        assert!(pat.matches("/customer/42/extra").is_none());
    }

    #[test]
    fn pattern_param_wrong_static_segment() {
        let pat = Pattern::parse("/customer/:pk");
        assert!(pat.matches("/orders/42").is_none());
    }

    // ── Router ────────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn get_matches() {
        let mut router = Router::new();
        router.get("/customers", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/customers")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn method_mismatch_is_404() {
        let mut router = Router::new();
        router.get("/customers", |_ctx| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/customers")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx| async {
            Response::new(StatusCode::Accepted)
        });

        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn parameterized_route_receives_params() {
        let mut router = Router::new();
        router.get("/customer/:pk", |ctx: Context| async move {
            let pk = ctx.params().get("pk").unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(pk)
        });
        let res = router.route(make_request("GET", "/customer/42")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_ref(), b"42");
    }

    #[tokio::test]
    async fn erased_handler_registers_through_closure() {
        let handler: Handler =
            Arc::new(|_ctx| Box::pin(async { Response::new(StatusCode::Accepted) }));
        let mut router = Router::new();
        router.get("/erased", move |ctx| handler(ctx));
        let res = router.route(make_request("GET", "/erased")).await;
        assert_eq!(res.status(), StatusCode::Accepted);
    }
}
