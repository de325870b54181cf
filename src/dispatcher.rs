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

//! C4: the upstream dispatcher (§4.4). A single long-lived HTTPS client
//! pool, plus the request retargeting every dispatch needs.

use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response, Uri};
use hyper_rustls::HttpsConnector;
use tokio::time::timeout;
use tracing::warn;
use url::Url;

use crate::config::DispatcherSettings;
use crate::error::DispatchError;

type HttpsClient = Client<HttpsConnector<HttpConnector>>;

/// A captured upstream response: status, cloned headers, full body bytes.
/// Capturing into memory (rather than an interceptor wrapping the
/// response writer) avoids the double-write bug noted in the source (§9).
pub struct CapturedResponse {
    pub status: u16,
    pub headers: hyper::HeaderMap,
    pub body: Bytes,
}

pub struct Dispatcher {
    client: HttpsClient,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(settings: DispatcherSettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.dial_timeout));
        connector.set_keepalive(Some(settings.keep_alive_interval));
        connector.enforce_http(false);

        let https = HttpsConnectorBuilderCompat::build(connector);

        let client = Client::builder()
            .pool_idle_timeout(settings.idle_connection_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections_per_host)
            .build::<_, Body>(https);

        Self { client, settings }
    }

    /// Sends `request` upstream and reads the full response into memory.
    /// The overall deadline approximates dial + TLS handshake + the
    /// 100-continue wait combined (hyper 0.14's client does not expose
    /// those as independently settable phases; see `DESIGN.md`).
    pub async fn dispatch(&self, request: Request<Body>) -> Result<CapturedResponse, DispatchError> {
        let overall_deadline = self.settings.dial_timeout
            + self.settings.tls_handshake_timeout
            + self.settings.continue_wait;

        let response = match timeout(overall_deadline, self.client.request(request)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(error = %e, "upstream dispatch failed");
                return Err(classify_hyper_error(e));
            }
            Err(_) => return Err(DispatchError::Timeout(overall_deadline)),
        };

        let (parts, body) = response.into_parts();
        let body_bytes = hyper::body::to_bytes(body)
            .await
            .map_err(|e| DispatchError::Read(e.to_string()))?;

        Ok(CapturedResponse {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body: body_bytes,
        })
    }
}

fn classify_hyper_error(e: hyper::Error) -> DispatchError {
    if e.is_connect() {
        DispatchError::Dial(e.to_string())
    } else {
        DispatchError::Read(e.to_string())
    }
}

/// Wraps `hyper_rustls`'s builder so the call site above stays readable;
/// split out mainly so the TLS setup has a single named place to change.
struct HttpsConnectorBuilderCompat;

impl HttpsConnectorBuilderCompat {
    /// `https_or_http` rather than `https_only`: production points at
    /// `https://esi.evetech.net/`, but the upstream base URL is
    /// operator-overridable (§10.1) for integration testing against a
    /// local plain-HTTP stand-in, and the connector has to allow that.
    fn build(connector: HttpConnector) -> HttpsConnector<HttpConnector> {
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector)
    }
}

/// Retargets an inbound request at the upstream (§4.4's "URL
/// retargeting"): scheme/host become the upstream's, the path is
/// single-joining-slash-joined with the upstream's base path, `Host` is
/// rewritten, and the inbound host is preserved in `X-Forwarded-Host`.
/// Nothing else about the request — notably `Authorization` — is touched.
pub fn retarget(mut request: Request<Body>, upstream: &Url) -> Result<Request<Body>, DispatchError> {
    let inbound_host = request
        .headers()
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let upstream_host = upstream
        .host_str()
        .ok_or_else(|| DispatchError::BuildRequest("upstream url has no host".to_string()))?;
    let upstream_authority = match upstream.port() {
        Some(port) => format!("{upstream_host}:{port}"),
        None => upstream_host.to_string(),
    };

    let joined_path_and_query = single_joining_slash(upstream.path(), request.uri());

    let new_uri: Uri = format!(
        "{}://{}{}",
        upstream.scheme(),
        upstream_authority,
        joined_path_and_query
    )
    .parse()
    .map_err(|e: hyper::http::uri::InvalidUri| DispatchError::BuildRequest(e.to_string()))?;

    *request.uri_mut() = new_uri;
    request.headers_mut().insert(
        hyper::header::HOST,
        upstream_authority
            .parse()
            .map_err(|e: hyper::header::InvalidHeaderValue| DispatchError::BuildRequest(e.to_string()))?,
    );
    if !inbound_host.is_empty() {
        if let Ok(value) = inbound_host.parse() {
            request.headers_mut().insert("x-forwarded-host", value);
        }
    }

    Ok(request)
}

/// Joins an upstream base path with an inbound request's path+query,
/// ensuring exactly one `/` at the boundary (§3, §4.4).
fn single_joining_slash(base: &str, inbound: &Uri) -> String {
    let path = inbound.path();
    let query = inbound
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();

    let joined_path = join_paths(base, path);
    format!("{joined_path}{query}")
}

fn join_paths(a: &str, b: &str) -> String {
    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');
    match (a_slash, b_slash) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}
