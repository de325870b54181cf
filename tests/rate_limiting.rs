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

//! §8 scenarios 3-4: backoff shape, and requests arriving during an
//! active backoff being queued (and eventually served) rather than
//! rejected, in strict FIFO order.

mod support;

use std::sync::Arc;
use std::time::Duration;

use esi_proxy::config::{CacheSettings, Config, DispatcherSettings, ServerTimeouts};
use esi_proxy::handler;
use esi_proxy::queue;
use esi_proxy::state::AppState;
use hyper::{Body, Request};
use support::CannedResponse;

fn test_config(upstream: url::Url) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        admin_port: 0,
        upstream_base_url: upstream,
        dial_home: false,
        external_address: None,
        owner: String::new(),
        proxy_name: "test".into(),
        dispatcher: DispatcherSettings::default(),
        server_timeouts: ServerTimeouts::default(),
        cache: CacheSettings::default(),
        rate_limit_budget: 100,
    }
}

fn new_state_with_drainer(upstream: url::Url) -> Arc<AppState> {
    let config = Arc::new(test_config(upstream));
    let (queue_handle, receiver) = queue::channel();
    let state = Arc::new(AppState::new(config, queue_handle));
    tokio::spawn(handler::run_queue_drainer(state.clone(), receiver));
    state
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("host", "proxy.example.com")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn backoff_is_applied_after_upstream_reports_pressure() {
    let upstream = support::spawn(vec![CannedResponse::new(200)
        .header("x-esi-error-limit-remain", "50")
        .header("x-esi-error-limit-reset", "1")
        .body(b"first")])
    .await;
    let state = new_state_with_drainer(upstream.base_url.clone());

    handler::handle(&state, get("/a")).await;

    // f = 0.5, max_sleep = 1s -> ~250ms.
    let backoff = state.rate_limiter.current_backoff();
    assert!(backoff > Duration::ZERO);
    assert!(backoff <= Duration::from_millis(260));
}

#[tokio::test]
async fn queued_requests_are_served_in_fifo_order_once_backoff_clears() {
    let upstream = support::spawn(vec![
        CannedResponse::new(200)
            .header("x-esi-error-limit-remain", "1")
            .header("x-esi-error-limit-reset", "1")
            .body(b"first"),
        CannedResponse::new(200).body(b"second"),
        CannedResponse::new(200).body(b"third"),
    ])
    .await;
    let state = new_state_with_drainer(upstream.base_url.clone());

    // Triggers the backoff: remaining=1/100, reset=1s -> ~0.98s.
    let first = handler::handle(&state, get("/a")).await;
    assert_eq!(
        hyper::body::to_bytes(first.into_body()).await.unwrap(),
        &b"first"[..]
    );
    assert!(state.rate_limiter.current_backoff() > Duration::ZERO);

    // Both of these land in the queue before the backoff clears.
    let state_b = state.clone();
    let state_c = state.clone();
    let fut_b = tokio::spawn(async move { handler::handle(&state_b, get("/b")).await });
    let fut_c = tokio::spawn(async move { handler::handle(&state_c, get("/c")).await });

    let resp_b = fut_b.await.unwrap();
    let resp_c = fut_c.await.unwrap();

    assert_eq!(
        hyper::body::to_bytes(resp_b.into_body()).await.unwrap(),
        &b"second"[..]
    );
    assert_eq!(
        hyper::body::to_bytes(resp_c.into_body()).await.unwrap(),
        &b"third"[..]
    );
    assert!(resp_c.headers().get("x-slept-by-proxy").is_none());
}
