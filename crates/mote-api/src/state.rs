//! Shared state handed to every handler.

use std::sync::Arc;

use mote_config::ConfigService;

use crate::restart::Restarter;

/// Dependencies of the HTTP handlers.
pub struct ApiState {
    pub(crate) config: ConfigService,
    pub(crate) restarter: Arc<dyn Restarter>,
}

impl ApiState {
    /// Bundle the configuration service with the restart hook.
    #[must_use]
    pub fn new(config: ConfigService, restarter: Arc<dyn Restarter>) -> Self {
        Self { config, restarter }
    }
}
