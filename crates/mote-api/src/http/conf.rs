//! Configuration endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use mote_config::ConfigStatus;
use serde::Deserialize;
use tracing::info;

use crate::http::responses;
use crate::state::ApiState;

/// Query accepted by the read endpoints; `?pretty` indents the output.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ViewQuery {
    #[serde(default)]
    pretty: Option<String>,
}

impl ViewQuery {
    const fn pretty(&self) -> bool {
        self.pretty.is_some()
    }
}

pub(crate) async fn get_defaults(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    match state.config.get_defaults().await {
        Ok(defaults) => responses::json(StatusCode::OK, &defaults, query.pretty()),
        Err(err) => responses::status(err.status),
    }
}

pub(crate) async fn get_current(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    responses::json(StatusCode::OK, &state.config.get_current(), query.pretty())
}

pub(crate) async fn save(State(state): State<Arc<ApiState>>, body: Bytes) -> Response {
    match state.config.save(&body).await {
        Ok(()) => {
            info!(bytes = body.len(), "configuration saved");
            responses::status_then_restart(ConfigStatus::Ok, state.restarter.clone(), "save")
        }
        Err(err) => responses::status(err.status),
    }
}

pub(crate) async fn reset(State(state): State<Arc<ApiState>>) -> Response {
    match state.config.reset().await {
        Ok(()) => {
            responses::status_then_restart(ConfigStatus::Ok, state.restarter.clone(), "reset")
        }
        Err(err) => responses::status(err.status),
    }
}

pub(crate) async fn reboot(State(state): State<Arc<ApiState>>) -> Response {
    responses::empty_then_restart(state.restarter.clone(), "reboot")
}

pub(crate) async fn ro_vars(State(state): State<Arc<ApiState>>) -> Response {
    responses::json(StatusCode::OK, &state.config.list_read_only(), false)
}
