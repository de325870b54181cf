// Copyright (C) 2025 Matías Salinas (support@fenden.com)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! C1: the response cache (§4.1). Keyed by request fingerprint, entries
//! carry their own TTL rather than sharing one global expiration, so a
//! custom `moka::Expiry` is used instead of `CacheBuilder::time_to_live`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::HeaderMap;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use sha2::{Digest, Sha256};
use tracing::debug;

/// An immutable captured response, ready to be replayed verbatim.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    ttl: Duration,
}

impl CachedResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Bytes, ttl: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            ttl,
        }
    }

    fn content_type(&self) -> Option<&str> {
        self.headers
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }
}

struct TtlExpiry;

impl Expiry<String, CachedResponse> for TtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Thread-safe cache shared by every request task.
#[derive(Clone)]
pub struct Cache {
    inner: MokaCache<String, CachedResponse>,
    allowed_content_types: Arc<HashSet<String>>,
}

impl Cache {
    pub fn new(allowed_content_types: HashSet<String>) -> Self {
        let inner = MokaCache::builder()
            .expire_after(TtlExpiry)
            .build();
        Self {
            inner,
            allowed_content_types: Arc::new(allowed_content_types),
        }
    }

    /// Looks up `key`. Applies the content-type gate (§4.1): an entry whose
    /// `Content-Type` is not in the allowed set is discarded and treated as
    /// a miss, guarding against caching error pages from the upstream.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.inner.get(key).await?;
        match entry.content_type() {
            Some(ct) if self.allowed_content_types.contains(ct) => Some(entry),
            other => {
                debug!(content_type = ?other, key, "discarding cached entry: content-type not allowed");
                self.inner.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set(&self, key: String, entry: CachedResponse) {
        self.inner.insert(key, entry).await;
    }

    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Eagerly reclaims expired entries. Called on a fixed cadence by a
    /// background task (§4.1: "A background sweep pass runs on a fixed
    /// cadence").
    pub async fn sweep(&self) {
        self.inner.run_pending_tasks().await;
    }
}

/// Computes the SHA-256 fingerprint described in §3: method, scheme, host,
/// path, raw query string, and the values of a header whitelist.
pub fn fingerprint(
    method: &str,
    scheme: &str,
    host: &str,
    path: &str,
    query: &str,
    headers: &HeaderMap,
) -> String {
    const WHITELIST: [&str; 3] = ["authorization", "accept", "accept-encoding"];

    let mut preimage = String::new();
    preimage.push_str(method);
    preimage.push('|');
    preimage.push_str(scheme);
    preimage.push('|');
    preimage.push_str(host);
    preimage.push('|');
    preimage.push_str(path);
    preimage.push('|');
    preimage.push_str(query);

    for name in WHITELIST {
        preimage.push('|');
        preimage.push_str(name);
        preimage.push('=');
        if let Some(value) = headers.get(name) {
            preimage.push_str(value.to_str().unwrap_or(""));
        }
    }

    let digest = Sha256::digest(preimage.as_bytes());
    hex::encode(digest)
}

/// Eligibility predicate for `set` (§4.1): GET requests, 200/304 responses,
/// with usable freshness metadata.
pub fn is_cache_eligible(method: &str, status: u16) -> bool {
    method.eq_ignore_ascii_case("GET") && (status == 200 || status == 304)
}

/// TTL derivation (§4.1): prefer `Date`/`Expires`, fall back to
/// `Cache-Control: max-age`. Returns `None` when neither source yields a
/// TTL greater than one second.
pub fn derive_ttl(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ttl) = ttl_from_date_expires(headers) {
        if ttl > Duration::from_secs(1) {
            return Some(ttl);
        }
        return None;
    }

    if let Some(ttl) = ttl_from_max_age(headers) {
        if ttl > Duration::from_secs(1) {
            return Some(ttl);
        }
    }

    None
}

fn ttl_from_date_expires(headers: &HeaderMap) -> Option<Duration> {
    let date = parse_http_date(headers, hyper::header::DATE)?;
    let expires = parse_http_date(headers, hyper::header::EXPIRES)?;
    expires
        .duration_since(date)
        .ok()
        .or(Some(Duration::from_secs(0)))
}

fn parse_http_date(
    headers: &HeaderMap,
    name: hyper::header::HeaderName,
) -> Option<std::time::SystemTime> {
    let raw = headers.get(name)?.to_str().ok()?;
    httpdate::parse_http_date(raw).ok()
}

fn ttl_from_max_age(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(hyper::header::CACHE_CONTROL)?
        .to_str()
        .ok()?;
    for directive in raw.split(',') {
        let directive = directive.trim();
        if let Some(value) = directive.strip_prefix("max-age=") {
            if let Ok(seconds) = value.trim().parse::<u64>() {
                return Some(Duration::from_secs(seconds));
            }
        }
    }
    None
}
