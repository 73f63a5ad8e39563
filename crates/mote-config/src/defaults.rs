//! Well-known configuration file names.
//!
//! # Design
//! - One place for the layer file names so the loader, service, and boot
//!   sequence agree on them.

/// Mandatory system defaults, merged with the unrestricted rule.
pub const SYS_DEFAULTS_FILE: &str = "conf_sys_defaults.json";
/// Mandatory application defaults, merged with the declared `conf_acl`.
pub const APP_DEFAULTS_FILE: &str = "conf_app_defaults.json";
/// Optional vendor defaults, merged with the declared `conf_acl`.
pub const VENDOR_FILE: &str = "conf_vendor.json";
/// On-device user overrides written by `save`.
pub const USER_FILE: &str = "conf.json";

/// File names of every configuration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// System defaults file.
    pub sys_defaults: String,
    /// Application defaults file.
    pub app_defaults: String,
    /// Vendor defaults file.
    pub vendor: String,
    /// User override file.
    pub user: String,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            sys_defaults: SYS_DEFAULTS_FILE.to_string(),
            app_defaults: APP_DEFAULTS_FILE.to_string(),
            vendor: VENDOR_FILE.to_string(),
            user: USER_FILE.to_string(),
        }
    }
}
