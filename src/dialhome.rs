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

//! Dial-home (§6): a fire-and-forget startup POST publishing this
//! instance's external URL and owner to a public registry. Never fatal.

use hyper::{Body, Client, Method, Request};
use hyper_rustls::HttpsConnectorBuilder;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Serialize)]
struct DialHomeBody<'a> {
    id: &'a str,
    url: &'a str,
    owner: &'a str,
}

/// Posts `{"id", "url", "owner"}` to the registry. Logs the outcome either
/// way; the caller is expected to `tokio::spawn` this and never `.await`
/// it on the request path.
pub async fn announce(url: &str, id: &str, owner: &str, external_address: &str) {
    let payload = DialHomeBody {
        id,
        url: external_address,
        owner,
    };

    let body = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to serialize dial-home payload");
            return;
        }
    };

    let request = match Request::builder()
        .method(Method::POST)
        .uri(url)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to build dial-home request");
            return;
        }
    };

    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .https_or_http()
        .enable_http1()
        .build();
    let client: Client<_, Body> = Client::builder().build(connector);

    match client.request(request).await {
        Ok(resp) => info!(status = %resp.status(), "dial-home response"),
        Err(e) => warn!(error = %e, "dial-home request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_expected_shape() {
        let payload = DialHomeBody {
            id: "abc",
            url: "https://proxy.example.com",
            owner: "me",
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"id":"abc","url":"https://proxy.example.com","owner":"me"}"#
        );
    }
}
