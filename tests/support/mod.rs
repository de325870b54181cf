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

//! A tiny in-process stand-in for ESI, used so integration tests never
//! touch the real network (§10.6). Each configured response is served
//! once, in order; once exhausted the last response repeats.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};

pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: &'static [u8],
}

impl CannedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: b"",
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: &'static [u8]) -> Self {
        self.body = body;
        self
    }
}

pub struct MockUpstream {
    pub base_url: url::Url,
    pub hit_count: Arc<AtomicUsize>,
}

/// Spawns a mock upstream on an ephemeral loopback port, serving
/// `responses` in order (the last one repeats once the queue is empty).
pub async fn spawn(responses: Vec<CannedResponse>) -> MockUpstream {
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
    let hit_count = Arc::new(AtomicUsize::new(0));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let queue_for_svc = queue.clone();
    let hits_for_svc = hit_count.clone();
    let make_svc = make_service_fn(move |_conn| {
        let queue = queue_for_svc.clone();
        let hits = hits_for_svc.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| {
                let queue = queue.clone();
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let canned = {
                        let mut q = queue.lock().unwrap();
                        if q.len() > 1 {
                            q.pop_front().unwrap()
                        } else if let Some(last) = q.front() {
                            CannedResponse {
                                status: last.status,
                                headers: last.headers.clone(),
                                body: last.body,
                            }
                        } else {
                            CannedResponse::new(200)
                        }
                    };

                    let mut builder = Response::builder().status(canned.status);
                    for (name, value) in canned.headers {
                        builder = builder.header(name, value);
                    }
                    Ok::<_, Infallible>(builder.body(Body::from(canned.body)).unwrap())
                }
            }))
        }
    });

    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(server);

    MockUpstream {
        base_url: url::Url::parse(&format!("http://{addr}/")).unwrap(),
        hit_count,
    }
}
