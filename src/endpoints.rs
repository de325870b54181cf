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

//! Fixed, trivial-response endpoints (§4.5 step 1, §6). These never touch
//! C1-C4: they are matched on path before the proxy pipeline sees the
//! request at all.

use hyper::{Body, Response};

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <title>EVE-Online API Proxy</title>
        <style>
            body {
                font-family: Arial, sans-serif;
                margin: 0;
                padding: 0;
                display: flex;
                justify-content: center;
                align-items: center;
                height: 100vh;
                background-color: #0a0a0a;
                color: #eee;
            }
            .container {
                text-align: center;
                background-color: rgba(255, 255, 255, 0.08);
                padding: 20px 40px;
                border-radius: 10px;
            }
            a {
                color: #6cf;
                text-decoration: none;
            }
            a:hover {
                text-decoration: underline;
            }
        </style>
    </head>
    <body>
    <div class="container">
        <h1>Welcome to the ESI API Proxy</h1>
        <p>This site serves as a caching, rate-aware API proxy for EVE Online.</p>
        <p>For all API information, refer to the upstream documentation at
           <a href="https://esi.evetech.net" target="_blank">https://esi.evetech.net</a></p>
        <br/>
        <p>Anything ESI can serve, this proxy can also serve.</p>
    </div>
    </body>
</html>"#;

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

/// Matches a request against the fixed-endpoint table (§4.5 step 1, §6).
/// Returns `None` for anything that should fall through to the proxy
/// pipeline.
pub fn serve(method: &hyper::Method, path: &str) -> Option<Response<Body>> {
    if method != hyper::Method::GET {
        return None;
    }

    match path {
        "/" => Some(html(LANDING_PAGE)),
        "/healthz" | "/readyz" | "/ping" => Some(text(200, "ok")),
        "/robots.txt" => Some(
            Response::builder()
                .status(200)
                .header(hyper::header::CONTENT_TYPE, "text/plain")
                .body(Body::from(ROBOTS_TXT))
                .unwrap(),
        ),
        "/favicon.ico" => Some(text(404, "not found")),
        p if p.starts_with("/.well-known/") => Some(text(404, "not found")),
        _ => None,
    }
}

fn html(body: &'static str) -> Response<Body> {
    Response::builder()
        .status(200)
        .header(hyper::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

fn text(status: u16, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .unwrap()
}
