//! Firmware build metadata, surfaced as read-only variables.
//!
//! Values come from `MOTE_BUILD_ID` and `MOTE_BUILD_TIMESTAMP` at compile
//! time and fall back to development placeholders when unset.

/// Identity of the running firmware build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Build identifier, typically `<timestamp>/<branch>@<sha>`.
    pub id: &'static str,
    /// Build timestamp.
    pub timestamp: &'static str,
    /// Package version.
    pub version: &'static str,
    /// Target architecture.
    pub arch: &'static str,
}

impl BuildInfo {
    /// Metadata of the current binary.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            id: or_default(option_env!("MOTE_BUILD_ID"), "dev"),
            timestamp: or_default(option_env!("MOTE_BUILD_TIMESTAMP"), "unknown"),
            version: env!("CARGO_PKG_VERSION"),
            arch: std::env::consts::ARCH,
        }
    }
}

const fn or_default(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => fallback,
    }
}
