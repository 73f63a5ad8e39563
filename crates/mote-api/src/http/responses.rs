//! Response builders.
//!
//! Every response closes its connection; restart-scheduling responses rely on
//! the connection ending once the body is written.

use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header::{CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use mote_config::ConfigStatus;
use mote_config::model::render_string;
use serde_json::{Value, json};
use tracing::error;

use crate::http::constants::{CONNECTION_CLOSE, CONTENT_TYPE_JSON};
use crate::restart::{RestartGuard, Restarter, body_then_restart};

pub(crate) fn json(status: StatusCode, value: &Value, pretty: bool) -> Response {
    match render_string(value, pretty) {
        Ok(body) => with_headers(status, Body::from(body)),
        Err(err) => {
            error!(error = %err, "failed to render response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub(crate) fn status(outcome: ConfigStatus) -> Response {
    json(http_status(outcome), &status_value(outcome), false)
}

/// Status response whose delivery triggers a restart.
pub(crate) fn status_then_restart(
    outcome: ConfigStatus,
    restarter: Arc<dyn Restarter>,
    reason: &'static str,
) -> Response {
    let body = status_value(outcome).to_string();
    with_headers(
        http_status(outcome),
        body_then_restart(body, RestartGuard::new(restarter, reason)),
    )
}

pub(crate) fn empty_then_restart(restarter: Arc<dyn Restarter>, reason: &'static str) -> Response {
    (
        StatusCode::OK,
        [(CONNECTION, CONNECTION_CLOSE)],
        body_then_restart("", RestartGuard::new(restarter, reason)),
    )
        .into_response()
}

fn with_headers(status: StatusCode, body: Body) -> Response {
    (
        status,
        [(CONTENT_TYPE, CONTENT_TYPE_JSON), (CONNECTION, CONNECTION_CLOSE)],
        body,
    )
        .into_response()
}

fn status_value(outcome: ConfigStatus) -> Value {
    json!({ "status": outcome.code() })
}

const fn http_status(outcome: ConfigStatus) -> StatusCode {
    match outcome {
        ConfigStatus::Ok => StatusCode::OK,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
