//! Request ID middleware helpers for the device HTTP surface.
//!
//! # Design
//! - Every request gets an `x-request-id`; one supplied by the client is
//!   echoed back unchanged so device logs can be matched to client logs.

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer that assigns an `x-request-id` to requests arriving without one.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request's `x-request-id` onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
