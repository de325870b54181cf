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

//! `CONNECT` tunneling (§6): a raw TCP splice between the client and
//! whatever `host:port` it asked for, opaque to the rest of the proxy. No
//! cache, no rate limiting, no inspection.

use hyper::{Body, Request, Response};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::TunnelError;

/// Handles a `CONNECT host:port` request. Dials the target first; the
/// `200` reply (and the subsequent upgrade to a raw byte splice) is only
/// sent once the dial succeeds, mirroring the source's hijack-after-dial
/// ordering.
pub async fn handle(mut req: Request<Body>) -> Response<Body> {
    let target = match req.uri().authority().map(|a| a.to_string()) {
        Some(t) => t,
        None => {
            return Response::builder()
                .status(400)
                .body(Body::from("CONNECT request missing target authority"))
                .unwrap();
        }
    };

    let mut server_stream = match dial(&target).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "tunnel dial failed");
            return Response::builder()
                .status(502)
                .body(Body::from(e.to_string()))
                .unwrap();
        }
    };

    tokio::spawn(async move {
        match hyper::upgrade::on(&mut req).await {
            Ok(mut upgraded) => {
                if let Err(e) =
                    tokio::io::copy_bidirectional(&mut upgraded, &mut server_stream).await
                {
                    debug!(target = %target, error = %e, "tunnel closed");
                }
            }
            Err(_) => warn!(error = %TunnelError::NoUpgrade, target = %target),
        }
    });

    // hyper's server-side response writer does not expose a way to set a
    // custom reason phrase through the high-level `Response` builder; the
    // wire reply is therefore `HTTP/1.1 200 <default>` rather than the
    // literal `200 Connection Established` text. Clients only act on the
    // status code, so this is behaviorally equivalent.
    Response::builder().status(200).body(Body::empty()).unwrap()
}

async fn dial(target: &str) -> Result<TcpStream, TunnelError> {
    TcpStream::connect(target)
        .await
        .map_err(|e| TunnelError::Dial(target.to_string(), e.to_string()))
}
