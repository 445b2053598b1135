//! Cache key derivation.
//!
//! A cache key is built from three parts, joined by `:` —
//!
//! ```text
//! {namespace}:{operation}:{canonical arguments}
//! ```
//!
//! The canonicalization rules make key derivation deterministic and
//! injective with respect to distinct argument sets:
//!
//! - arguments are sorted ascending by name, so call-site order never
//!   changes the key;
//! - names and values are escaped (`%`, `&`, `=`, `:`), so separator
//!   characters inside a value cannot forge a different argument list;
//! - an *absent* optional argument is omitted entirely, while an
//!   explicitly *empty* value keeps its `name=` pair — "field omitted"
//!   and "field empty" never collide.
//!
//! The namespace prefix is mandatory. Unrelated cache users sharing one
//! backend are isolated by namespace, and [`clear`](crate::cache::CacheBackend::clear)
//! operates on the prefix a builder exposes.

/// Builds cache keys for one namespace.
///
/// # Examples
///
/// ```
/// use cachet::cache::KeyBuilder;
///
/// let keys = KeyBuilder::new("demo-cache");
/// let key = keys.build("customer.get", [("pk", Some("42"))]);
/// assert_eq!(key, "demo-cache:customer.get:pk=42");
/// ```
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    /// Creates a builder for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace this builder prefixes every key with.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the prefix shared by every key this builder produces.
    /// Suitable as the argument to a backend `clear`.
    pub fn prefix(&self) -> String {
        format!("{}:", escape(&self.namespace))
    }

    /// Derives the key for one logical operation and its effective
    /// arguments.
    ///
    /// `args` carries `(name, value)` pairs where `None` means the
    /// argument was absent. Identical `(operation, args)` inputs always
    /// produce identical keys regardless of iteration order; any
    /// differing argument value produces a different key.
    pub fn build<'a>(
        &self,
        operation: &str,
        args: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    ) -> String {
        let mut present: Vec<(&str, &str)> = args
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        present.sort_unstable();

        let mut key = String::with_capacity(64);
        key.push_str(&escape(&self.namespace));
        key.push(':');
        key.push_str(&escape(operation));
        key.push(':');

        for (i, (name, value)) in present.iter().enumerate() {
            if i > 0 {
                key.push('&');
            }
            key.push_str(&escape(name));
            key.push('=');
            key.push_str(&escape(value));
        }

        key
    }
}

// Escapes the characters that act as separators in the key format, plus
// the escape character itself. Lossless: distinct inputs stay distinct.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}
