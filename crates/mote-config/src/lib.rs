#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Layered device configuration with field-level access control.
//!
//! Layout: `schema.rs` (field descriptors), `acl.rs` (access rules),
//! `model.rs` (configuration tree), `loader.rs` (layer merging),
//! `placeholder.rs` (identifier substitution), `ro_vars.rs` (read-only
//! variables), `service.rs` (`ConfigService`), `fs.rs` (device storage).

pub mod acl;
pub mod defaults;
pub mod error;
pub mod fs;
pub mod loader;
pub mod model;
pub mod placeholder;
pub mod ro_vars;
pub mod schema;
pub mod service;

pub use defaults::ConfigPaths;
pub use error::{ConfigError, ConfigResult};
pub use fs::{DeviceFs, DirFs};
pub use loader::{ConfigLoader, Source};
pub use model::{Config, LiveConfig};
pub use placeholder::{expand_config_placeholders, expand_placeholders, hex_id};
pub use ro_vars::{RoValue, RoVarRegistry};
pub use schema::{FieldDescriptor, FieldType, Schema, TypedValue};
pub use service::{ConfigService, ConfigStatus, ServiceError, ServiceResult, UploadOutcome};
