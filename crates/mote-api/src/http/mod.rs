//! HTTP routing and handlers.

pub(crate) mod conf;
pub(crate) mod constants;
pub(crate) mod responses;
pub mod router;
pub(crate) mod upload;
