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

//! §9's "Global state" note: the cache, rate limiter, queue, and
//! dispatcher are process-wide singletons constructed once at startup,
//! but handed to request handlers explicitly through this struct rather
//! than read from module-level globals.

use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::queue::QueueHandle;
use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Cache,
    pub rate_limiter: Arc<RateLimiter>,
    pub queue: QueueHandle,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: Arc<Config>, queue: QueueHandle) -> Self {
        let cache = Cache::new(config.cache.allowed_content_types.clone());
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_budget));
        let dispatcher = Arc::new(Dispatcher::new(config.dispatcher.clone()));

        Self {
            config,
            cache,
            rate_limiter,
            queue,
            dispatcher,
        }
    }
}
