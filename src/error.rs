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

use thiserror::Error;

/// Failure modes surfaced while dispatching a request to the upstream (C4).
///
/// These never disturb the cache or the rate limiter — callers map every
/// variant to a `502 Bad Gateway`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dial to upstream failed: {0}")]
    Dial(String),

    #[error("tls handshake with upstream failed: {0}")]
    Tls(String),

    #[error("upstream request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("reading upstream response failed: {0}")]
    Read(String),

    #[error("malformed request could not be built: {0}")]
    BuildRequest(String),
}

/// Failure modes surfaced by the `CONNECT` tunnel (§6).
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to dial tunnel target {0}: {1}")]
    Dial(String, String),

    #[error("client connection does not support hijacking/upgrade")]
    NoUpgrade,
}

/// Top-level configuration failure. Fatal at startup (§7: "the listener
/// itself failing to bind" is the only other fatal condition).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid upstream base url {0:?}: {1}")]
    InvalidUpstreamUrl(String, String),

    #[error("DIAL_HOME is enabled but EXTERNAL_ADDRESS is not set")]
    DialHomeMissingExternalAddress,

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}
