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

//! Background cache eviction (§4.1: "a background sweep pass runs on a
//! fixed cadence"). Mirrors the shape of the teacher's memory-pressure
//! eviction task, but on a fixed timer rather than a usage threshold,
//! since the cache here has no size bound to react to.

use std::time::Duration;

use tokio::task;
use tracing::debug;

use crate::cache::Cache;

/// Spawns a task that calls `cache.sweep()` every `interval` for the
/// lifetime of the process.
pub fn start_background_sweep_task(cache: Cache, interval: Duration) {
    task::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // `interval()`'s first tick fires immediately; skip it so the first
        // real sweep happens after a full interval has elapsed.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let before = cache.entry_count();
            cache.sweep().await;
            debug!(
                entries_before = before,
                entries_after = cache.entry_count(),
                "cache sweep completed"
            );
        }
    });
}
