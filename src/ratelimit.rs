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

//! C2: the rate limiter (§4.2). Tracks the upstream's reported error
//! budget and computes how long the proxy should hold off before its next
//! dispatch.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The mutable state, guarded by a single mutex so the four fields are
/// never read torn (§3: "reads of `backoff_until` are consistent").
struct State {
    remaining: i64,
    reset: i64,
    last_update: Instant,
    backoff_until: Instant,
}

pub struct RateLimiter {
    state: Mutex<State>,
    budget: i64,
}

impl RateLimiter {
    pub fn new(budget: i64) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(State {
                remaining: budget,
                reset: 0,
                last_update: now,
                backoff_until: now,
            }),
            budget,
        }
    }

    /// Recomputes `backoff_until` from scratch using the freshly reported
    /// `remaining`/`reset` (§4.2). Each call supersedes the previous
    /// backoff entirely — it is not accumulated.
    pub fn update(&self, remaining: i64, reset: i64) {
        let now = Instant::now();
        let sleep = backoff_duration(remaining, reset, self.budget);

        let mut state = self.state.lock().unwrap();
        state.remaining = remaining;
        state.reset = reset;
        state.last_update = now;
        state.backoff_until = now + sleep;
    }

    /// Returns the time remaining until the current backoff clears, or
    /// zero if none is active.
    pub fn current_backoff(&self) -> Duration {
        let state = self.state.lock().unwrap();
        state
            .backoff_until
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO)
    }

    /// A read-only snapshot of the last-reported error budget, for
    /// diagnostics (§10.4/§10.5) — never consulted by the gate itself.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        Snapshot {
            remaining: state.remaining,
            reset: state.reset,
            backoff_remaining: state
                .backoff_until
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub remaining: i64,
    pub reset: i64,
    pub backoff_remaining: Duration,
}

/// Pure backoff arithmetic (§4.2 and §8's quantified invariant), split out
/// so it can be tested without going through the mutex.
fn backoff_duration(remaining: i64, reset: i64, budget: i64) -> Duration {
    if remaining >= budget {
        return Duration::ZERO;
    }

    let f = (budget - remaining) as f64 / budget as f64;
    let max_sleep = Duration::from_secs(reset.max(0) as u64);
    let sleep = max_sleep.mul_f64(f * f);

    sleep.max(Duration::from_millis(1))
}
