//! Configuration operations served to remote callers.
//!
//! # Design
//! - Reads come from the live configuration or from freshly loaded defaults;
//!   nothing here mutates the live instance.
//! - `save` validates a payload against a complete defaults baseline before
//!   anything touches storage; changes take effect after the next restart.
//! - Failures carry a stable negative [`ConfigStatus`] for the caller.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::acl;
use crate::error::ConfigError;
use crate::fs::is_plain_name;
use crate::loader::{ConfigLoader, Source};
use crate::model::{Config, LiveConfig};
use crate::ro_vars::RoVarRegistry;

/// Outcome code reported to remote callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    /// Operation succeeded.
    Ok,
    /// The override file exists but could not be removed.
    RemoveFailed,
    /// The new override file could not be written.
    PersistFailed,
    /// The defaults baseline could not be loaded.
    DefaultsLoadFailed,
    /// The submitted payload could not be parsed.
    PayloadInvalid,
}

impl ConfigStatus {
    /// Stable numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::RemoveFailed => -1,
            Self::PersistFailed => -2,
            Self::DefaultsLoadFailed => -10,
            Self::PayloadInvalid => -11,
        }
    }
}

/// Failed configuration request.
#[derive(Debug, Error)]
#[error("configuration request failed")]
pub struct ServiceError {
    /// Status reported to the caller.
    pub status: ConfigStatus,
    /// Underlying configuration error.
    #[source]
    pub source: ConfigError,
}

impl ServiceError {
    const fn new(status: ConfigStatus, source: ConfigError) -> Self {
        Self { status, source }
    }
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// What happened to an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file was written.
    Stored,
    /// The name is not permitted by `http.upload_acl` or is hidden.
    Denied,
}

/// Read/save/reset operations over the device configuration.
#[derive(Clone)]
pub struct ConfigService {
    loader: ConfigLoader,
    live: LiveConfig,
    ro_vars: Arc<RoVarRegistry>,
}

impl ConfigService {
    /// Service over the booted live configuration.
    #[must_use]
    pub const fn new(loader: ConfigLoader, live: LiveConfig, ro_vars: Arc<RoVarRegistry>) -> Self {
        Self {
            loader,
            live,
            ro_vars,
        }
    }

    /// The live configuration.
    #[must_use]
    pub const fn live(&self) -> &LiveConfig {
        &self.live
    }

    /// Freshly layered defaults, ignoring on-device overrides.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigStatus::DefaultsLoadFailed`] when a mandatory layer is unusable.
    #[instrument(name = "config_service.get_defaults", skip(self))]
    pub async fn get_defaults(&self) -> ServiceResult<Value> {
        Ok(self.load_baseline().await?.to_json())
    }

    /// The live configuration, verbatim.
    #[must_use]
    pub fn get_current(&self) -> Value {
        self.live.to_json()
    }

    /// Validate `payload` over fresh defaults under the declared `conf_acl` and persist it.
    ///
    /// # Errors
    ///
    /// See [`ConfigService::save_with_acl`].
    #[instrument(name = "config_service.save", skip_all)]
    pub async fn save(&self, payload: &[u8]) -> ServiceResult<()> {
        let baseline = self.load_baseline().await?;
        let declared = baseline.conf_acl().to_string();
        self.save_over(baseline, payload, &declared).await
    }

    /// Validate `payload` over fresh defaults under `caller_acl` and persist it.
    ///
    /// The live configuration is not touched; the result applies after a restart.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigStatus::DefaultsLoadFailed`], [`ConfigStatus::PayloadInvalid`],
    /// or [`ConfigStatus::PersistFailed`].
    #[instrument(name = "config_service.save_with_acl", skip(self, payload))]
    pub async fn save_with_acl(&self, payload: &[u8], caller_acl: &str) -> ServiceResult<()> {
        let baseline = self.load_baseline().await?;
        self.save_over(baseline, payload, caller_acl).await
    }

    async fn save_over(&self, baseline: Config, payload: &[u8], acl: &str) -> ServiceResult<()> {
        let mut proposed = baseline.clone();
        self.loader
            .apply_override(&mut proposed, Source::Payload(payload), acl)
            .await
            .map_err(|err| {
                warn!(error = %err, "rejected configuration payload");
                ServiceError::new(ConfigStatus::PayloadInvalid, err)
            })?;
        self.loader
            .persist_user_override(&proposed, &baseline)
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to persist configuration");
                ServiceError::new(ConfigStatus::PersistFailed, err)
            })
    }

    /// Remove the user override file. Absence counts as success.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigStatus::RemoveFailed`] if the file exists but cannot be removed.
    #[instrument(name = "config_service.reset", skip(self))]
    pub async fn reset(&self) -> ServiceResult<()> {
        let removed = self
            .loader
            .remove_user_override()
            .await
            .map_err(|err| ServiceError::new(ConfigStatus::RemoveFailed, err))?;
        info!(removed, "configuration reset");
        Ok(())
    }

    /// Every read-only variable as a JSON object.
    #[must_use]
    pub fn list_read_only(&self) -> Value {
        self.ro_vars.to_json()
    }

    /// Store an uploaded file if `http.upload_acl` permits its name and
    /// `http.hidden_files` does not hide it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persist`] if a permitted file cannot be written.
    pub async fn store_upload(&self, name: &str, data: &[u8]) -> Result<UploadOutcome, ConfigError> {
        let upload_acl = self.live.get_str("http.upload_acl").unwrap_or("");
        let hidden = self
            .live
            .get_str("http.hidden_files")
            .is_some_and(|pattern| acl::is_file_allowed(pattern, name));
        if !is_plain_name(name) || hidden || !acl::is_file_allowed(upload_acl, name) {
            warn!(file = %name, "upload refused");
            return Ok(UploadOutcome::Denied);
        }
        self.loader
            .fs()
            .write(name, data)
            .await
            .map_err(|source| ConfigError::Persist {
                path: name.to_string(),
                source,
            })?;
        info!(file = %name, bytes = data.len(), "upload stored");
        Ok(UploadOutcome::Stored)
    }

    async fn load_baseline(&self) -> ServiceResult<Config> {
        self.loader.load_defaults().await.map_err(|err| {
            warn!(error = %err, "failed to load configuration defaults");
            ServiceError::new(ConfigStatus::DefaultsLoadFailed, err)
        })
    }
}
