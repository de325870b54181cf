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

//! End-to-end scenarios from §8: cache miss-then-hit, `Authorization`
//! partitioning, non-200 passthrough, and TTL=0 non-caching.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

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

fn new_state(upstream: url::Url) -> Arc<AppState> {
    let config = Arc::new(test_config(upstream));
    let (queue_handle, _receiver) = queue::channel();
    Arc::new(AppState::new(config, queue_handle))
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
async fn cache_miss_then_hit() {
    let upstream = support::spawn(vec![CannedResponse::new(200)
        .header("content-type", "application/json")
        .header("date", "Mon, 01 Jan 2024 00:00:00 GMT")
        .header("expires", "Mon, 01 Jan 2024 00:05:00 GMT")
        .body(br#"{"name":"x"}"#)])
    .await;
    let state = new_state(upstream.base_url.clone());

    let first = handler::handle(&state, get("/v5/characters/123/")).await;
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers().get("x-proxy-cache").unwrap(), "MISS");
    let first_body = hyper::body::to_bytes(first.into_body()).await.unwrap();
    assert_eq!(&first_body[..], br#"{"name":"x"}"#);

    let second = handler::handle(&state, get("/v5/characters/123/")).await;
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers().get("x-proxy-cache").unwrap(), "HIT");
    let second_body = hyper::body::to_bytes(second.into_body()).await.unwrap();
    assert_eq!(&second_body[..], br#"{"name":"x"}"#);

    assert_eq!(upstream.hit_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn authorization_partitions_the_cache() {
    let upstream = support::spawn(vec![CannedResponse::new(200)
        .header("content-type", "application/json")
        .header("date", "Mon, 01 Jan 2024 00:00:00 GMT")
        .header("expires", "Mon, 01 Jan 2024 00:05:00 GMT")
        .body(b"{}")])
    .await;
    let state = new_state(upstream.base_url.clone());

    let req_a = Request::builder()
        .method("GET")
        .uri("/v5/characters/123/")
        .header("host", "proxy.example.com")
        .header("authorization", "Bearer a")
        .body(Body::empty())
        .unwrap();
    let req_b = Request::builder()
        .method("GET")
        .uri("/v5/characters/123/")
        .header("host", "proxy.example.com")
        .header("authorization", "Bearer b")
        .body(Body::empty())
        .unwrap();

    let resp_a = handler::handle(&state, req_a).await;
    let resp_b = handler::handle(&state, req_b).await;

    assert_eq!(resp_a.headers().get("x-proxy-cache").unwrap(), "MISS");
    assert_eq!(resp_b.headers().get("x-proxy-cache").unwrap(), "MISS");
    assert_eq!(upstream.hit_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_200_is_not_cached() {
    let upstream = support::spawn(vec![CannedResponse::new(404)
        .header("content-type", "application/json")
        .body(br#"{"error":"not found"}"#)])
    .await;
    let state = new_state(upstream.base_url.clone());

    let first = handler::handle(&state, get("/v5/characters/999/")).await;
    assert_eq!(first.status(), 404);
    let second = handler::handle(&state, get("/v5/characters/999/")).await;
    assert_eq!(second.status(), 404);
    assert_eq!(second.headers().get("x-proxy-cache").unwrap(), "MISS");

    assert_eq!(upstream.hit_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn ttl_zero_is_not_cached() {
    let upstream = support::spawn(vec![CannedResponse::new(200)
        .header("content-type", "application/json")
        .header("date", "Mon, 01 Jan 2024 00:00:00 GMT")
        .header("expires", "Mon, 01 Jan 2024 00:00:00 GMT")
        .body(b"{}")])
    .await;
    let state = new_state(upstream.base_url.clone());

    handler::handle(&state, get("/v5/x/")).await;
    handler::handle(&state, get("/v5/x/")).await;

    assert_eq!(upstream.hit_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_get_method_never_hits_cache() {
    let upstream = support::spawn(vec![CannedResponse::new(200)
        .header("content-type", "application/json")
        .header("date", "Mon, 01 Jan 2024 00:00:00 GMT")
        .header("expires", "Mon, 01 Jan 2024 00:05:00 GMT")
        .body(b"{}")])
    .await;
    let state = new_state(upstream.base_url.clone());

    let post = || {
        Request::builder()
            .method("POST")
            .uri("/v5/x/")
            .header("host", "proxy.example.com")
            .body(Body::empty())
            .unwrap()
    };

    handler::handle(&state, post()).await;
    handler::handle(&state, post()).await;

    // Every POST dispatches upstream — even though the response carries
    // cacheable freshness metadata, §4.1's eligibility predicate requires
    // GET, so nothing was ever inserted for this fingerprint to hit.
    assert_eq!(upstream.hit_count.load(Ordering::SeqCst), 2);
}
