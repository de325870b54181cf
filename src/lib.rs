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

//! Library surface for `esi-proxy`, split out so integration tests under
//! `tests/` and the `esi-proxy` binary share the same code.

pub mod admin;
pub mod cache;
pub mod config;
pub mod dialhome;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod handler;
pub mod queue;
pub mod ratelimit;
pub mod state;
pub mod sweep;
pub mod tunnel;
