//! Multipart file upload into the device filesystem.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use mote_config::{ConfigStatus, UploadOutcome};
use serde_json::json;
use tracing::{error, warn};

use crate::http::responses;
use crate::state::ApiState;

/// Store every file part whose name `http.upload_acl` permits.
///
/// Parts without a file name are ignored; refused names are reported back
/// rather than failing the request.
pub(crate) async fn upload(State(state): State<Arc<ApiState>>, mut multipart: Multipart) -> Response {
    let mut stored = Vec::new();
    let mut denied = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "malformed upload");
                return responses::json(err.status(), &json!({ "error": err.body_text() }), false);
            }
        };
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(err) => {
                warn!(file = %name, error = %err, "upload interrupted");
                return responses::json(err.status(), &json!({ "error": err.body_text() }), false);
            }
        };
        match state.config.store_upload(&name, &data).await {
            Ok(UploadOutcome::Stored) => stored.push(name),
            Ok(UploadOutcome::Denied) => denied.push(name),
            Err(err) => {
                error!(file = %name, error = %err, "failed to store upload");
                return responses::status(ConfigStatus::PersistFailed);
            }
        }
    }
    responses::json(
        StatusCode::OK,
        &json!({ "status": ConfigStatus::Ok.code(), "stored": stored, "denied": denied }),
        false,
    )
}
