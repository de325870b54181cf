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

//! C5: the request handler (§4.5). Orchestrates C1 (cache), C2 (rate
//! limiter), C3 (queue), and C4 (dispatcher) for every inbound request
//! that isn't a `CONNECT` or a fixed endpoint — those are routed
//! elsewhere before this module ever sees the request.

use std::sync::Arc;
use std::time::Duration;

use hyper::header::{HeaderValue, HOST, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use hyper::{Body, HeaderMap, Method, Request, Response};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cache::{self, CachedResponse};
use crate::dispatcher;
use crate::error::DispatchError;
use crate::queue::QueuedRequest;
use crate::state::AppState;

/// Steps 2–9 of §4.5, minus the classification already done by the
/// router.
pub async fn handle(state: &AppState, req: Request<Body>) -> Response<Body> {
    let key = fingerprint_of(&req);

    if req.method() == Method::GET {
        if let Some(cached) = state.cache.get(&key).await {
            metrics::counter!("proxy_cache_hits_total").increment(1);
            return build_cached_response(cached);
        }
        metrics::counter!("proxy_cache_misses_total").increment(1);

        let backoff = state.rate_limiter.current_backoff();
        if backoff > Duration::ZERO {
            return enqueue_and_wait(state, req).await;
        }
    }

    dispatch_pipeline(state, req, key).await
}

/// Step 4's gate: hands the request to C3 and suspends on its own
/// one-shot reply rather than blocking the executor.
async fn enqueue_and_wait(state: &AppState, req: Request<Body>) -> Response<Body> {
    let (response_tx, response_rx) = oneshot::channel();
    state.queue.enqueue(req, response_tx);
    metrics::counter!("proxy_queue_enqueued_total").increment(1);
    metrics::gauge!("proxy_queue_depth").set(state.queue.depth() as f64);

    match response_rx.await {
        Ok(response) => response,
        Err(_) => {
            // The drainer dropped the sender without replying — this only
            // happens if the process is shutting down mid-drain.
            bad_gateway("request was queued but never completed")
        }
    }
}

/// Runs forever, draining C3 in strict FIFO order (§4.3, §8): dequeue →
/// consult C2 → sleep → dispatch via the same post-gate pipeline used by
/// the fast path.
pub async fn run_queue_drainer(state: Arc<AppState>, mut receiver: mpsc::UnboundedReceiver<QueuedRequest>) {
    while let Some(item) = receiver.recv().await {
        state.queue.mark_dequeued();
        metrics::gauge!("proxy_queue_depth").set(state.queue.depth() as f64);

        let backoff = state.rate_limiter.current_backoff();
        if backoff > Duration::ZERO {
            tokio::time::sleep(backoff).await;
        }

        let key = fingerprint_of(&item.request);
        let mut response = dispatch_pipeline(&state, item.request, key).await;

        if backoff > Duration::ZERO {
            if let Ok(value) = HeaderValue::from_str(&format!("{:.3}s", backoff.as_secs_f64())) {
                response.headers_mut().insert("x-slept-by-proxy", value);
            }
        }

        if item.response_tx.send(response).is_err() {
            debug!("queue drain: client already gone, discarding reply");
        }
    }
}

/// Steps 5–9: dispatch upstream, normalize the status, update the rate
/// limiter, insert into the cache if eligible, and build the client
/// reply.
async fn dispatch_pipeline(state: &AppState, request: Request<Body>, key: String) -> Response<Body> {
    let is_conditional =
        request.headers().contains_key(IF_NONE_MATCH) || request.headers().contains_key(IF_MODIFIED_SINCE);
    let method = request.method().as_str().to_string();

    let retargeted = match dispatcher::retarget(request, &state.config.upstream_base_url) {
        Ok(r) => r,
        Err(e) => return bad_gateway(&e.to_string()),
    };

    let captured = match state.dispatcher.dispatch(retargeted).await {
        Ok(c) => c,
        Err(e) => {
            metrics::counter!("proxy_upstream_errors_total").increment(1);
            return bad_gateway(&dispatch_error_message(&e));
        }
    };

    let (remaining, reset) = parse_rate_headers(&captured.headers);
    state.rate_limiter.update(remaining, reset);

    // Step 6: normalize 304 on a non-conditional request to 200.
    let outbound_status: u16 = if captured.status == 304 && !is_conditional {
        200
    } else {
        captured.status
    };

    if cache::is_cache_eligible(&method, captured.status) {
        if let Some(ttl) = cache::derive_ttl(&captured.headers) {
            let entry = CachedResponse::new(
                outbound_status,
                captured.headers.clone(),
                captured.body.clone(),
                ttl,
            );
            state.cache.set(key, entry).await;
        }
    }

    let mut builder = Response::builder().status(outbound_status);
    for (name, value) in captured.headers.iter() {
        builder = builder.header(name, value);
    }
    builder = builder.header("x-proxy-cache", "MISS");
    builder.body(Body::from(captured.body)).unwrap()
}

fn dispatch_error_message(e: &DispatchError) -> String {
    warn!(error = %e, "upstream dispatch failed");
    e.to_string()
}

fn bad_gateway(detail: &str) -> Response<Body> {
    Response::builder()
        .status(502)
        .header("x-proxy-cache", "MISS")
        .body(Body::from(format!("Bad Gateway: {detail}")))
        .unwrap()
}

fn build_cached_response(cached: CachedResponse) -> Response<Body> {
    let mut builder = Response::builder().status(cached.status);
    for (name, value) in cached.headers.iter() {
        builder = builder.header(name, value);
    }
    builder = builder.header("x-proxy-cache", "HIT");
    builder.body(Body::from(cached.body)).unwrap()
}

fn parse_rate_headers(headers: &HeaderMap) -> (i64, i64) {
    let remaining = header_as_i64(headers, "x-esi-error-limit-remain").unwrap_or(100);
    let reset = header_as_i64(headers, "x-esi-error-limit-reset").unwrap_or(0);
    (remaining, reset)
}

fn header_as_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn fingerprint_of(req: &Request<Body>) -> String {
    let scheme = req.uri().scheme_str().unwrap_or("http");
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| req.uri().host().unwrap_or(""));
    let path = req.uri().path();
    let query = req.uri().query().unwrap_or("");

    cache::fingerprint(req.method().as_str(), scheme, host, path, query, req.headers())
}
