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

//! `GET /admin/status`: a JSON snapshot of the cache and rate-limiter
//! state, for operators who want more than the Prometheus counters.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    cache_entries: u64,
    rate_limit: RateLimitStatus,
    queue_depth: usize,
}

#[derive(Serialize)]
struct RateLimitStatus {
    remaining: i64,
    reset_secs: i64,
    backoff_remaining_ms: u128,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.rate_limiter.snapshot();

    Json(StatusResponse {
        cache_entries: state.cache.entry_count(),
        rate_limit: RateLimitStatus {
            remaining: snapshot.remaining,
            reset_secs: snapshot.reset,
            backoff_remaining_ms: snapshot.backoff_remaining.as_millis(),
        },
        queue_depth: state.queue.depth(),
    })
}
