// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP control surface.
//!
//! - `GET /api/v0/train_status?id=<id>&step=<step>`: evaluate an update
//! - `GET /api/v0/reset?id=<id>&step=<step>`: replace the watched pair
//! - `GET /health`: liveness and bus connection status
//!
//! Missing query parameters are read as empty strings.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::processor::{StatusUpdate, TrainStatus, UpdateProcessor};
use crate::protocol::Notifier;

type SharedProcessor<N> = Arc<UpdateProcessor<N>>;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    bus_connected: bool,
}

/// Builds the router for the control surface.
pub fn router<N: Notifier + 'static>(processor: SharedProcessor<N>) -> Router {
    Router::new()
        .route("/api/v0/train_status", get(train_status::<N>))
        .route("/api/v0/reset", get(reset::<N>))
        .route("/health", get(health::<N>))
        .layer(TraceLayer::new_for_http())
        .with_state(processor)
}

/// Serves the control surface on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns error if the listener cannot be bound or the server fails.
pub async fn serve<N, F>(
    addr: SocketAddr,
    processor: SharedProcessor<N>,
    shutdown: F,
) -> Result<(), Error>
where
    N: Notifier + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(processor))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn train_status<N: Notifier + 'static>(
    State(processor): State<SharedProcessor<N>>,
    Query(update): Query<StatusUpdate>,
) -> Response {
    tracing::info!(id = %update.id, step = %update.step, "Called /api/v0/train_status");
    let status = processor.process(&update).await;
    json_response(&status)
}

async fn reset<N: Notifier + 'static>(
    State(processor): State<SharedProcessor<N>>,
    Query(update): Query<StatusUpdate>,
) -> Response {
    tracing::info!(id = %update.id, step = %update.step, "Reset requested");
    let status = processor.reset(&update.id, &update.step);
    json_response(&status)
}

async fn health<N: Notifier + 'static>(
    State(processor): State<SharedProcessor<N>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        bus_connected: processor.notifier().is_ready(),
    })
}

/// Encodes `status` as the response body, or a 500 carrying the error text.
fn json_response(status: &TrainStatus) -> Response {
    match serde_json::to_vec(status) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_response_sets_content_type() {
        let response = json_response(&TrainStatus {
            id: "2".to_string(),
            step: "37".to_string(),
            acc_flg: true,
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn health_response_encoding() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok",
            version: "0.1.0",
            bus_connected: false,
        })
        .unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["bus_connected"], false);
    }
}
