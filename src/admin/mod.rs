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

//! Operational surface (§10.4/§10.5): a small admin router, separate from
//! the proxy listener, exposing diagnostics over the in-memory state. No
//! persistent storage backends survive from the teacher here — the cache
//! is in-memory only (§1 Non-goals), so there is nothing to invalidate
//! beyond this process's own state.

pub mod invalidate;
pub mod status;
