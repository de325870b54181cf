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

//! Process bootstrap: parses configuration, wires C1-C5 into an
//! `AppState`, and starts two listeners — the proxy itself, and a small
//! admin/metrics surface (§10.4/§10.5) — plus the queue drainer and cache
//! sweep background tasks.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::process::exit;
use std::sync::Arc;

use axum::routing::{delete, get};
use axum::Router;
use clap::Parser;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Method, Request, Response, Server};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use esi_proxy::admin;
use esi_proxy::config::{Args, Config};
use esi_proxy::dialhome;
use esi_proxy::endpoints;
use esi_proxy::handler;
use esi_proxy::queue;
use esi_proxy::state::AppState;
use esi_proxy::sweep;
use esi_proxy::tunnel;

fn init_logging() {
    let filter = EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Routes a single inbound request per §4.5 step 1: `CONNECT` goes to the
/// tunnel, fixed paths get their static reply, everything else enters the
/// C5 pipeline.
async fn route(state: Arc<AppState>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() == Method::CONNECT {
        return Ok(tunnel::handle(req).await);
    }

    if let Some(resp) = endpoints::serve(req.method(), req.uri().path()) {
        return Ok(resp);
    }

    Ok(handler::handle(&state, req).await)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            exit(1);
        }
    };

    init_logging();

    let recorder_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let config = Arc::new(config);
    let (queue_handle, queue_receiver) = queue::channel();
    let state = Arc::new(AppState::new(config.clone(), queue_handle));

    tokio::spawn(handler::run_queue_drainer(state.clone(), queue_receiver));
    sweep::start_background_sweep_task(state.cache.clone(), config.cache.sweep_interval);

    if config.dial_home {
        let dial_home_url = config.dial_home_url().to_string();
        let proxy_name = config.proxy_name.clone();
        let owner = config.owner.clone();
        // Validated at config-load time: `dial_home` implies this is `Some`.
        let external_address = config.external_address.clone().unwrap_or_default();
        tokio::spawn(async move {
            dialhome::announce(&dial_home_url, &proxy_name, &owner, &external_address).await;
        });
    }

    let proxy_addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .unwrap_or_else(|e| {
            error!("invalid HOST/PORT combination: {e}");
            exit(1);
        });

    let admin_state = state.clone();
    let admin_router = Router::new()
        .route("/admin/status", get(admin::status::get_status))
        .route("/admin/cache", delete(admin::invalidate::invalidate_cache))
        .route(
            "/metrics",
            get(move || async move { recorder_handle.render() }),
        )
        .with_state(admin_state);
    let admin_addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));

    info!(%proxy_addr, "proxy listening");
    info!(%admin_addr, "admin/metrics listening");

    let proxy_listener = match TcpListener::bind(proxy_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "failed to bind proxy listener");
            exit(1);
        }
    };
    let proxy_timeouts = config.server_timeouts.clone();
    let proxy_task = tokio::spawn(run_proxy_listener(proxy_listener, state.clone(), proxy_timeouts));

    let admin_server = Server::bind(&admin_addr).serve(admin_router.into_make_service());

    tokio::select! {
        res = proxy_task => {
            if let Err(e) = res {
                error!(error = %e, "proxy listener task panicked");
            }
            exit(1);
        }
        res = admin_server => {
            if let Err(e) = res {
                error!(error = %e, "admin server exited with error");
            }
        }
    }
}

/// Accepts connections and serves each with its own per-connection
/// deadlines (§5): a header-read timeout, and an overall idle timeout that
/// also bounds how long writing the response may take. `CONNECT` needs
/// `with_upgrades()`, so this is a manual accept loop rather than the
/// high-level `Server::serve`.
async fn run_proxy_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    timeouts: esi_proxy::config::ServerTimeouts,
) {
    let mut http = Http::new();
    http.http1_header_read_timeout(timeouts.read);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let state = state.clone();
        let http = http.clone();
        let idle = timeouts.idle;

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let state = state.clone();
                async move { route(state, req).await }
            });

            let conn = http.serve_connection(stream, svc).with_upgrades();
            match tokio::time::timeout(idle, conn).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(%peer, error = %e, "connection closed with error"),
                Err(_) => tracing::debug!(%peer, "connection idle timeout reached, dropping"),
            }
        });
    }
}
