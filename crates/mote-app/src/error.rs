//! # Design
//!
//! - Centralize boot and bootstrap errors.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Each boot failure maps to exactly one stage and its stable code.

use std::io;
use std::path::PathBuf;

use mote_api::ApiServerError;
use mote_config::ConfigError;
use mote_telemetry::TelemetryError;
use thiserror::Error;

/// Result alias for application bootstrap.
pub type AppResult<T> = Result<T, AppError>;

/// Boot stages that can fail, each with a stable diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    /// Mounting the filesystem of the current slot.
    Filesystem,
    /// Applying a freshly flashed update.
    UpdateApply,
    /// Loading configuration and starting the HTTP listener.
    DeviceConfig,
    /// Application initialisation.
    AppInit,
}

impl BootStage {
    /// Code reported for a successful boot.
    pub const SUCCESS_CODE: i32 = 0;

    /// Stable negative code for a failure in this stage.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Filesystem => -1,
            Self::UpdateApply => -2,
            Self::DeviceConfig => -3,
            Self::AppInit => -4,
        }
    }
}

/// Fatal failure of one boot stage.
#[derive(Debug, Error)]
pub enum BootError {
    /// The update descriptor could not be read.
    #[error("update descriptor unavailable")]
    Descriptor {
        /// Underlying updater error.
        source: UpdateError,
    },
    /// The update descriptor names no filesystem for the current slot.
    #[error("no filesystem location for the current slot")]
    MissingSlot {
        /// Slot index from the update descriptor.
        slot: usize,
    },
    /// The filesystem could not be mounted.
    #[error("filesystem mount failed")]
    Mount {
        /// Location that failed to mount.
        location: String,
        /// Underlying platform error.
        source: PlatformError,
    },
    /// The pending update could not be applied.
    #[error("pending update could not be applied")]
    UpdateApply {
        /// Underlying updater error.
        source: UpdateError,
    },
    /// A mandatory defaults layer could not be loaded.
    #[error("configuration defaults could not be loaded")]
    Defaults {
        /// Underlying configuration error.
        source: ConfigError,
    },
    /// Platform services could not be configured.
    #[error("platform initialisation failed")]
    PlatformInit {
        /// Underlying platform error.
        source: PlatformError,
    },
    /// The HTTP listener could not be started.
    #[error("http listener could not be started")]
    Listener {
        /// Underlying server error.
        source: ApiServerError,
    },
    /// The application refused to start.
    #[error("application initialisation failed")]
    AppInit {
        /// Underlying application error.
        source: AppInitError,
    },
}

impl BootError {
    /// Stage the failure belongs to.
    #[must_use]
    pub const fn stage(&self) -> BootStage {
        match self {
            Self::Descriptor { .. } | Self::MissingSlot { .. } | Self::Mount { .. } => {
                BootStage::Filesystem
            }
            Self::UpdateApply { .. } => BootStage::UpdateApply,
            Self::Defaults { .. } | Self::PlatformInit { .. } | Self::Listener { .. } => {
                BootStage::DeviceConfig
            }
            Self::AppInit { .. } => BootStage::AppInit,
        }
    }

    /// Stable code of the failing stage.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.stage().code()
    }
}

/// Errors raised by platform services.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A filesystem location is unusable.
    #[error("filesystem location unavailable")]
    Mount {
        /// Location attempted.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A platform service rejected its configuration.
    #[error("platform service misconfigured")]
    Service {
        /// Service identifier.
        service: &'static str,
        /// Machine-readable reason.
        reason: String,
    },
}

/// Errors raised by the firmware updater.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Reading update state failed.
    #[error("update state unreadable")]
    Read {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Update state was malformed.
    #[error("update state malformed")]
    Parse {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Writing update state or migrated files failed.
    #[error("update state could not be written")]
    Write {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The descriptor names a slot without a filesystem location.
    #[error("update slot unknown")]
    UnknownSlot {
        /// Slot index.
        slot: usize,
    },
}

/// Application initialisation failure.
#[derive(Debug, Error)]
#[error("application refused to start")]
pub struct AppInitError {
    /// Component that failed.
    pub component: &'static str,
    /// Machine-readable reason.
    pub reason: String,
}

/// Application-level error type for the binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },
    /// Environment configuration was malformed.
    #[error("invalid environment configuration")]
    InvalidEnv {
        /// Name of the environment variable.
        name: &'static str,
        /// Rejected value.
        value: String,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn api_server(operation: &'static str, source: ApiServerError) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes_are_stable() {
        assert_eq!(BootStage::SUCCESS_CODE, 0);
        assert_eq!(BootStage::Filesystem.code(), -1);
        assert_eq!(BootStage::UpdateApply.code(), -2);
        assert_eq!(BootStage::DeviceConfig.code(), -3);
        assert_eq!(BootStage::AppInit.code(), -4);
    }

    #[test]
    fn boot_errors_map_to_their_stage() {
        assert_eq!(BootError::MissingSlot { slot: 1 }.code(), -1);
        let listener = BootError::Listener {
            source: ApiServerError::Bind {
                addr: "x".to_string(),
                source: io::Error::other("busy"),
            },
        };
        assert_eq!(listener.stage(), BootStage::DeviceConfig);
        let app = BootError::AppInit {
            source: AppInitError {
                component: "main",
                reason: "no".to_string(),
            },
        };
        assert_eq!(app.code(), -4);
        assert_eq!(app.to_string(), "application initialisation failed");
    }

    #[test]
    fn app_error_helpers_build_variants() {
        let api = AppError::api_server(
            "serve",
            ApiServerError::Serve {
                source: io::Error::other("io"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { operation: "serve", .. }));
    }
}
