use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use super::AppState;
use crate::lookup::{LookupRequest, LookupResponse};
use crate::metrics::export_metrics;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Response {
    let report = state.stats.generate().await;
    state.metrics.record_report(&report);

    match report.to_pretty_json() {
        Ok(body) => json_response(StatusCode::OK, body + "\n"),
        Err(e) => {
            error!(error = %e, "Failed to encode stats report");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn check_identifier(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: LookupRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected malformed lookup request");
            return encode(StatusCode::BAD_REQUEST, &LookupResponse::error(e.to_string()));
        }
    };

    let started = Instant::now();
    let result = state
        .lookup
        .find_in_queue(&request.queue, &request.identifier)
        .await;

    let outcome = match &result {
        Ok(outcome) => outcome.label(),
        Err(e) => {
            warn!(
                queue = %request.queue,
                identifier = %request.identifier,
                error = %e,
                "Identifier lookup failed"
            );
            "error"
        }
    };
    state
        .metrics
        .record_lookup(outcome, started.elapsed().as_secs_f64());

    encode(StatusCode::OK, &LookupResponse::from_result(result))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        export_metrics(),
    )
}

fn encode<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_string(body) {
        Ok(body) => json_response(status, body + "\n"),
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}
