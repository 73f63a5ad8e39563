#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Firmware boot sequence and host wiring.
//!
//! Layout: `boot.rs` (stage orchestration, commit/revert), `platform.rs`
//! (collaborator traits, update descriptor), `host.rs` (directory-backed
//! implementations), `bootstrap.rs` (environment and serve loop).

/// Boot stage orchestration.
pub mod boot;
/// Host bootstrap and serve loop.
pub mod bootstrap;
pub mod error;
/// Directory-backed platform, updater, and application.
pub mod host;
pub mod platform;

pub use boot::{BootDependencies, BootOrchestrator, Device, serve_device, stage_code};
pub use bootstrap::{RestartSignal, Shutdown, run_app};
pub use error::{AppError, AppInitError, AppResult, BootError, BootStage, PlatformError, UpdateError};
pub use platform::{Application, FsLocation, Platform, UpdateDescriptor, Updater};
