#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! HTTP surface of the device configuration service.
//!
//! Layout: `http/router.rs` (`ApiServer`), `http/conf.rs` (configuration
//! endpoints), `http/upload.rs` (file upload), `http/responses.rs` (response
//! builders), `restart.rs` (deferred restart), `state.rs`, `error.rs`.

pub mod error;
pub mod http;
pub mod restart;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::{ApiServer, BoundServer};
pub use restart::Restarter;
pub use state::ApiState;
