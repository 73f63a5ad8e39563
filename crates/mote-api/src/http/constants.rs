//! Route paths and header values shared by the router and handlers.

pub(crate) const ROUTE_DEFAULTS: &str = "/conf/defaults";
pub(crate) const ROUTE_CURRENT: &str = "/conf/current";
pub(crate) const ROUTE_SAVE: &str = "/conf/save";
pub(crate) const ROUTE_RESET: &str = "/conf/reset";
pub(crate) const ROUTE_CONF_REBOOT: &str = "/conf/reboot";
pub(crate) const ROUTE_REBOOT: &str = "/reboot";
pub(crate) const ROUTE_RO_VARS: &str = "/ro_vars";
pub(crate) const ROUTE_UPLOAD: &str = "/upload";

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONNECTION_CLOSE: &str = "close";
