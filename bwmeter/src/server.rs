// Copyright (c) Facebook, Inc. and its affiliates.
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


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::header;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::routing::get;
use model::Meter;
use model::SessionId;
use slog::debug;
use slog::error;
use slog::info;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

pub const SESSION_COOKIE: &str = "BWMETER_SESSID";

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Clone)]
struct AppState {
    meter: Arc<Meter>,
    logger: slog::Logger,
}

/// The `interface` query parameter. When it is repeated the last one wins,
/// and no query string is ever rejected.
fn requested_interface(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .filter(|(name, _)| name == "interface")
        .map(|(_, value)| value)
        .last()
}

/// Value of our session cookie in the request, if any
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

fn set_cookie_header(id: &SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id
    ))
    .ok()
}

/// Chart page. Every full page load starts a fresh history.
async fn index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let id = state
        .meter
        .sessions()
        .reset(session_cookie(&headers).as_deref());
    debug!(state.logger, "Page load, new session"; "session" => id.as_str());

    let mut response = Html(INDEX_HTML).into_response();
    if let Some(cookie) = set_cookie_header(&id) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// Poll endpoint. Failures are reported in the body with a 200 status.
async fn data(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let cookie = session_cookie(&headers);
    let id = state.meter.sessions().touch_or_create(cookie.as_deref());
    let body = state.meter.poll(&id, requested_interface(pairs)).await;

    let mut response = Json(body).into_response();
    if cookie.as_deref() != Some(id.as_str()) {
        if let Some(cookie) = set_cookie_header(&id) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }
    response
}

pub fn router(meter: Arc<Meter>, logger: slog::Logger) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/data.php", get(data))
        .layer(cors)
        .with_state(AppState { meter, logger })
}

async fn shutdown_signal(logger: slog::Logger) {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(logger, "Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate => {},
    }
    info!(logger, "Stop signal received, exiting.");
}

pub async fn serve(meter: Arc<Meter>, listen: SocketAddr, logger: slog::Logger) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!(
        logger,
        "Serving bandwidth meter on http://{}",
        listener.local_addr().context("Failed to get local address")?
    );

    axum::serve(listener, router(meter, logger.clone()))
        .with_graceful_shutdown(shutdown_signal(logger))
        .await
        .context("Server stopped unexpectedly")
}
