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

//! `DELETE /admin/cache`: drops every entry from C1. There is no
//! persistent backend to cascade to (§1 Non-goals: "no persistent
//! storage"), unlike the teacher's multi-cloud invalidation fan-out.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Serialize)]
struct InvalidateResponse {
    cleared_entries: u64,
}

pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cleared_entries = state.cache.entry_count();
    state.cache.invalidate_all().await;
    info!(cleared_entries, "admin: cache invalidated");
    Json(InvalidateResponse { cleared_entries })
}
