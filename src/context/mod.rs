//! Per-request context — the parsed request plus router captures.
//!
//! A [`Context`] is handed to every handler and middleware. It owns the
//! [`Request`] and the path parameters the router extracted; the cache key
//! builder reads both when deriving a key for a cacheable route.

use std::collections::HashMap;

use crate::Request;

/// Path parameters extracted from the matched route pattern.
///
/// For the pattern `/customer/:pk` matched against `/customer/42`,
/// `params.get("pk")` returns `Some("42")`.
#[derive(Default, Debug, Clone)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a captured parameter.
    pub fn insert(&mut self, name: String, value: String) {
        self.map.insert(name, value);
    }

    /// Returns a captured value by parameter name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Returns all `(name, value)` pairs in arbitrary order. The cache key
    /// builder sorts these by name before use.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of captured parameters.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no parameters were captured.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-request context: the parsed request and the router's path captures.
pub struct Context {
    request: Request,
    params: Parameters,
}

impl Context {
    /// Creates a context with no path parameters.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: Parameters::new(),
        }
    }

    /// Creates a context carrying the parameters captured by a route match.
    pub fn with_params(request: Request, params: Parameters) -> Self {
        Self { request, params }
    }

    /// Returns the request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the path parameters captured by the router.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Consumes the context, yielding the request. Used by terminal
    /// middleware that hands the request on to a router.
    pub fn into_request(self) -> Request {
        self.request
    }

    /// Deserializes the request body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the body is not
    /// valid JSON for `T`.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
