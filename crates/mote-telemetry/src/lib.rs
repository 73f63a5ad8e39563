#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Telemetry primitives shared across the mote workspace.
//!
//! Layout: `init.rs` (subscriber setup and runtime level control),
//! `layers.rs` (request-id middleware), `build_info.rs` (firmware build
//! metadata), `error.rs` (`TelemetryError`).

pub mod build_info;
pub mod error;
pub mod init;
pub mod layers;

pub use build_info::BuildInfo;
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LogLevelHandle, LoggingConfig, build_sha, init_logging,
    level_for_debug,
};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
