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

//! C3: the deferred-request queue (§4.3). An `mpsc` channel plays the role
//! of the source's condvar-guarded slice: a single drainer reads from one
//! receiver, which is exactly strict FIFO by construction, and the
//! response sink is a `oneshot` so the handler task can simply `.await`
//! its own reply without blocking the runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::{Body, Request, Response};
use tokio::sync::{mpsc, oneshot};

/// A request held during backoff, paired with the channel its eventual
/// reply travels back on.
pub struct QueuedRequest {
    pub request: Request<Body>,
    pub response_tx: oneshot::Sender<Response<Body>>,
}

/// Handle used by request tasks to enqueue. Cheap to clone; cloning does
/// not duplicate the queue, only the sending half of the channel.
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::UnboundedSender<QueuedRequest>,
    depth: Arc<AtomicUsize>,
}

impl QueueHandle {
    /// Appends to the tail and returns immediately (§4.3: "enqueue appends
    /// and signals a waiting drainer"). Never blocks.
    pub fn enqueue(&self, request: Request<Body>, response_tx: oneshot::Sender<Response<Body>>) {
        self.depth.fetch_add(1, Ordering::Relaxed);
        // An error here means the drainer task has terminated, which only
        // happens on process shutdown; nothing productive to do but drop.
        let _ = self.sender.send(QueuedRequest {
            request,
            response_tx,
        });
    }

    /// Current number of items waiting to be drained. Diagnostic only
    /// (§10.4's queue-depth gauge); never consulted by the gate itself.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Called by the drainer once an item has been popped off the
    /// receiver, to keep the depth gauge accurate.
    pub fn mark_dequeued(&self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Constructs a fresh queue, returning the producer handle and the
/// receiving half the drainer task consumes.
pub fn channel() -> (QueueHandle, mpsc::UnboundedReceiver<QueuedRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let handle = QueueHandle {
        sender,
        depth: Arc::new(AtomicUsize::new(0)),
    };
    (handle, receiver)
}
