//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::reload;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
    /// A log filter directive could not be parsed.
    InvalidDirective {
        /// Directive that was rejected.
        directive: String,
        /// Underlying parse error.
        source: ParseError,
    },
    /// Swapping the active log filter failed.
    Reload {
        /// Underlying reload error.
        source: reload::Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::InvalidDirective { .. } => formatter.write_str("invalid log filter directive"),
            Self::Reload { .. } => formatter.write_str("failed to reload log filter"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::InvalidDirective { source, .. } => Some(source),
            Self::Reload { source } => Some(source),
        }
    }
}
