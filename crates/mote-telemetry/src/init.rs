//! Logging initialisation and runtime level control.
//!
//! # Design
//! - Centralises logging setup (fmt or JSON) with a single entry point.
//! - The filter sits behind a reload layer so the level stored in device
//!   configuration can be applied once configuration has loaded.
//! - An explicit `RUST_LOG` always wins over the configured level.

use once_cell::sync::OnceCell;
use tracing::{debug, warn};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::build_info::BuildInfo;
use crate::error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<LogLevelHandle> {
    // First initialisation wins; later calls keep the recorded sha.
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let from_env = EnvFilter::try_from_default_env().ok();
    let env_override = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(config.level));
    let (filter, handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .try_init(),
    }
    .map_err(|source| TelemetryError::SubscriberInstall { source })?;

    Ok(LogLevelHandle {
        handle: Some(handle),
        env_override,
    })
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Filter directive for a device `debug.level` value.
///
/// `-1` disables logging, `0` through `4` select error, warn, info, debug,
/// and trace. Anything else has no mapping.
#[must_use]
pub const fn level_for_debug(level: i64) -> Option<&'static str> {
    match level {
        -1 => Some("off"),
        0 => Some("error"),
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        4 => Some("trace"),
        _ => None,
    }
}

/// Handle for changing the log level after initialisation.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    env_override: bool,
}

impl LogLevelHandle {
    /// Handle that is not attached to any subscriber; level changes are no-ops.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            handle: None,
            env_override: false,
        }
    }

    /// Replace the active filter with `directive`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directive cannot be parsed or the filter cannot be swapped.
    pub fn set_level(&self, directive: &str) -> Result<()> {
        let filter =
            EnvFilter::try_new(directive).map_err(|source| TelemetryError::InvalidDirective {
                directive: directive.to_string(),
                source,
            })?;
        let Some(handle) = &self.handle else {
            return Ok(());
        };
        handle
            .reload(filter)
            .map_err(|source| TelemetryError::Reload { source })
    }

    /// Apply a device `debug.level` value. Returns whether the level changed.
    ///
    /// Values without a mapping and handles whose level was fixed by
    /// `RUST_LOG` are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter cannot be swapped.
    pub fn apply_debug_level(&self, level: i64) -> Result<bool> {
        if self.env_override {
            debug!(level, "RUST_LOG set; ignoring configured debug level");
            return Ok(false);
        }
        let Some(directive) = level_for_debug(level) else {
            warn!(level, "ignoring out-of-range debug level");
            return Ok(false);
        };
        self.set_level(directive)?;
        Ok(self.handle.is_some())
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level string (e.g., `info`, `debug`).
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
    /// Build identifier recorded in structured logs.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: BuildInfo::current().id,
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_levels_map_to_directives() {
        assert_eq!(level_for_debug(-1), Some("off"));
        assert_eq!(level_for_debug(0), Some("error"));
        assert_eq!(level_for_debug(2), Some("info"));
        assert_eq!(level_for_debug(4), Some("trace"));
        assert_eq!(level_for_debug(5), None);
        assert_eq!(level_for_debug(-2), None);
    }

    #[test]
    fn detached_handle_accepts_valid_levels() -> Result<()> {
        let handle = LogLevelHandle::detached();
        handle.set_level("debug")?;
        assert!(!handle.apply_debug_level(3)?);
        assert!(!handle.apply_debug_level(42)?);
        Ok(())
    }

    #[test]
    fn detached_handle_still_validates_directives() {
        let handle = LogLevelHandle::detached();
        assert!(matches!(
            handle.set_level("mote=loud"),
            Err(TelemetryError::InvalidDirective { .. })
        ));
    }

    #[test]
    fn default_config_uses_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::infer());
    }

    #[test]
    fn build_sha_defaults_to_dev() {
        assert!(!build_sha().is_empty());
    }

    #[test]
    fn second_init_keeps_the_first_build_sha() {
        let first = init_logging(&LoggingConfig {
            build_sha: "abc123",
            ..LoggingConfig::default()
        });
        let second = init_logging(&LoggingConfig {
            build_sha: "def456",
            ..LoggingConfig::default()
        });
        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "abc123");
    }
}
