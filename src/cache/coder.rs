//! Serialization of cached responses to and from backend storage blobs.
//!
//! A backend stores one opaque byte blob per key. The blob layout is a
//! small envelope:
//!
//! ```text
//! ┌──────────────┬───────────────────┬──────────────┐
//! │ u32 (BE) len │ metadata (JSON)   │ body (raw)   │
//! └──────────────┴───────────────────┴──────────────┘
//! ```
//!
//! Metadata (status, preserved headers, stored-at, TTL) stays readable
//! with standard tooling, while the body is carried verbatim — the
//! round-trip is byte-exact, which matters for non-UTF-8 payloads.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{Headers, Response, StatusCode};

/// Response headers preserved through the cache. Everything else is
/// reconstructed at serve time (connection management, content length).
pub const PRESERVED_HEADERS: [&str; 2] = ["content-type", "etag"];

/// Errors from encoding or decoding a cache entry.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode cache entry metadata: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cache entry metadata: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("cache entry blob truncated: {0}")]
    Truncated(&'static str),

    #[error("cached status code {0} is not representable")]
    UnknownStatus(u16),
}

// The JSON part of the envelope.
#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: i64,
    ttl_seconds: u64,
}

/// One cached response, as held by a backend.
///
/// Entries are immutable: a new write for the same key fully replaces the
/// prior entry. `stored_at` (unix seconds, UTC) plus `ttl_seconds` lets
/// the read-through core compute expiry for backends without native TTLs,
/// and the remaining freshness reported on a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: i64,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Captures a response into an entry, keeping only the
    /// [`PRESERVED_HEADERS`] subset.
    pub fn from_response(response: &Response, stored_at: i64, ttl_seconds: u64) -> Self {
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                PRESERVED_HEADERS
                    .iter()
                    .any(|preserved| name.eq_ignore_ascii_case(preserved))
            })
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();

        Self {
            status: response.status().as_u16(),
            headers,
            body: Bytes::copy_from_slice(response.body_ref()),
            stored_at,
            ttl_seconds,
        }
    }

    /// Rebuilds the response this entry captured.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownStatus`] when the stored status code does not
    /// map back to a [`StatusCode`]. The read-through core treats that as
    /// a corrupt entry, i.e. a miss.
    pub fn into_response(self) -> Result<Response, CodecError> {
        let status =
            StatusCode::from_u16(self.status).ok_or(CodecError::UnknownStatus(self.status))?;
        let headers: Headers = self.headers.into_iter().collect();
        Ok(Response::from_parts(status, headers, self.body.to_vec()))
    }

    /// Returns `true` once `now` (unix seconds) has passed the entry's TTL.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.stored_at.saturating_add(self.ttl_seconds as i64)
    }

    /// Seconds of freshness left at `now`; zero for expired entries.
    pub fn remaining_ttl(&self, now: i64) -> u64 {
        let deadline = self.stored_at.saturating_add(self.ttl_seconds as i64);
        deadline.saturating_sub(now).max(0) as u64
    }
}

/// Encodes entries to blobs and back.
pub struct Coder;

impl Coder {
    /// Serializes an entry into a single blob.
    ///
    /// # Errors
    ///
    /// [`CodecError::Encode`] when the metadata cannot be serialized.
    pub fn encode(entry: &CacheEntry) -> Result<Bytes, CodecError> {
        let meta = Meta {
            status: entry.status,
            headers: entry.headers.clone(),
            stored_at: entry.stored_at,
            ttl_seconds: entry.ttl_seconds,
        };
        let meta_json = serde_json::to_vec(&meta).map_err(CodecError::Encode)?;

        let mut buf = BytesMut::with_capacity(4 + meta_json.len() + entry.body.len());
        buf.put_u32(meta_json.len() as u32);
        buf.put_slice(&meta_json);
        buf.put_slice(&entry.body);
        Ok(buf.freeze())
    }

    /// Deserializes a blob back into an entry.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] when the blob is shorter than its own
    /// framing claims; [`CodecError::Decode`] when the metadata JSON is
    /// malformed.
    pub fn decode(blob: &[u8]) -> Result<CacheEntry, CodecError> {
        if blob.len() < 4 {
            return Err(CodecError::Truncated("missing length prefix"));
        }
        let meta_len = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
        let body_start = 4 + meta_len;
        if blob.len() < body_start {
            return Err(CodecError::Truncated("metadata shorter than declared"));
        }

        let meta: Meta = serde_json::from_slice(&blob[4..body_start]).map_err(CodecError::Decode)?;

        Ok(CacheEntry {
            status: meta.status,
            headers: meta.headers,
            body: Bytes::copy_from_slice(&blob[body_start..]),
            stored_at: meta.stored_at,
            ttl_seconds: meta.ttl_seconds,
        })
    }
}
