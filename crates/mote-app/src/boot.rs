//! Boot orchestration and the update commit/revert decision.
//!
//! # Design
//! - Stages run strictly in order and the first fatal failure short-circuits
//!   the rest. Each failure carries the stable code of its stage.
//! - The factory-reset input is read after the defaults load and before the
//!   user override is applied, so an override file cannot mask it.
//! - Success on the first boot after an update commits it; any failure after
//!   a fresh update reverts it. Failures always end in a restart.
//! - The live configuration is built once here and only shared read-only.

use std::future::Future;
use std::io;
use std::sync::Arc;

use mote_api::{ApiServer, ApiServerError, BoundServer, Restarter};
use mote_config::{
    Config, ConfigLoader, ConfigPaths, ConfigService, DeviceFs, LiveConfig, RoValue,
    RoVarRegistry, Schema, expand_config_placeholders, hex_id,
};
use mote_telemetry::BuildInfo;
use tracing::{error, info, instrument, warn};

use crate::error::{BootError, BootStage};
use crate::platform::{Application, Platform, UpdateDescriptor, Updater};

/// Everything the boot sequence talks to.
pub struct BootDependencies {
    /// Hardware and OS services.
    pub platform: Arc<dyn Platform>,
    /// Firmware update state machine.
    pub updater: Arc<dyn Updater>,
    /// Product application.
    pub application: Arc<dyn Application>,
    /// Hook invoked by HTTP handlers once their response is delivered.
    pub restarter: Arc<dyn Restarter>,
    /// Registry receiving build metadata and the MAC address.
    pub ro_vars: Arc<RoVarRegistry>,
    /// Configuration layer file names.
    pub paths: ConfigPaths,
}

/// A successfully booted device.
pub struct Device {
    /// Live configuration, read-only until the next restart.
    pub live: LiveConfig,
    /// Configuration service bound to the mounted filesystem.
    pub service: ConfigService,
    /// HTTP listener, present when `http.enable` is set.
    pub server: Option<BoundServer>,
}

/// Code of a boot result: [`BootStage::SUCCESS_CODE`] or the failing stage's code.
#[must_use]
pub const fn stage_code<T>(result: &Result<T, BootError>) -> i32 {
    match result {
        Ok(_) => BootStage::SUCCESS_CODE,
        Err(err) => err.code(),
    }
}

/// Runs the boot stages in order.
pub struct BootOrchestrator {
    deps: BootDependencies,
    schema: Arc<Schema>,
}

impl BootOrchestrator {
    /// Orchestrator over the built-in device schema.
    #[must_use]
    pub fn new(deps: BootDependencies) -> Self {
        Self::with_schema(deps, Schema::device())
    }

    /// Orchestrator over a custom schema.
    #[must_use]
    pub const fn with_schema(deps: BootDependencies, schema: Arc<Schema>) -> Self {
        Self { deps, schema }
    }

    /// Boot the device, then commit, or revert and restart.
    ///
    /// # Errors
    ///
    /// Returns the first fatal stage failure. By then the revert (if an update
    /// was just applied) and the restart request have already been issued.
    #[instrument(name = "boot.run", skip(self))]
    pub async fn run(&self) -> Result<Device, BootError> {
        self.deps.platform.init_diagnostics();

        let descriptor = match self.deps.updater.descriptor().await {
            Ok(descriptor) => descriptor,
            Err(source) => return Err(self.fail(None, BootError::Descriptor { source }).await),
        };

        match self.stages(&descriptor).await {
            Ok(device) => {
                if descriptor.is_first_boot {
                    match self.deps.updater.commit().await {
                        Ok(()) => info!("firmware update committed"),
                        Err(err) => error!(error = %err, "failed to commit firmware update"),
                    }
                }
                info!(code = BootStage::SUCCESS_CODE, "boot complete");
                Ok(device)
            }
            Err(err) => Err(self.fail(Some(&descriptor), err).await),
        }
    }

    async fn fail(&self, descriptor: Option<&UpdateDescriptor>, err: BootError) -> BootError {
        error!(stage = ?err.stage(), code = err.code(), error = %err, "boot failed");
        if descriptor.is_some_and(|descriptor| descriptor.fw_updated) {
            match self.deps.updater.revert().await {
                Ok(()) => warn!("firmware update reverted"),
                Err(revert_err) => error!(error = %revert_err, "failed to revert firmware update"),
            }
        }
        self.deps.platform.restart();
        err
    }

    async fn stages(&self, descriptor: &UpdateDescriptor) -> Result<Device, BootError> {
        let fs = self.mount(descriptor).await?;

        if descriptor.fw_updated {
            info!("applying pending firmware update");
            self.deps
                .updater
                .apply(descriptor)
                .await
                .map_err(|source| BootError::UpdateApply { source })?;
        }

        let (live, service) = self.init_device_config(fs).await?;
        let server = self.start_listener(&live, &service).await?;

        self.deps
            .application
            .init(&live)
            .await
            .map_err(|source| BootError::AppInit { source })?;
        if let Some(seconds) = live.get_int("sys.wdt_timeout") {
            self.deps.platform.set_watchdog_timeout(seconds);
        }

        Ok(Device {
            live,
            service,
            server,
        })
    }

    async fn mount(&self, descriptor: &UpdateDescriptor) -> Result<Arc<dyn DeviceFs>, BootError> {
        let location = descriptor
            .current_location()
            .ok_or(BootError::MissingSlot {
                slot: descriptor.current_slot,
            })?;
        let fs = self
            .deps
            .platform
            .mount_fs(location)
            .await
            .map_err(|source| BootError::Mount {
                location: location.path.clone(),
                source,
            })?;
        info!(slot = descriptor.current_slot, path = %location.path, "filesystem mounted");
        Ok(fs)
    }

    async fn init_device_config(
        &self,
        fs: Arc<dyn DeviceFs>,
    ) -> Result<(LiveConfig, ConfigService), BootError> {
        let loader = ConfigLoader::new(fs, Arc::clone(&self.schema), self.deps.paths.clone());
        let mut cfg = loader
            .load_defaults()
            .await
            .map_err(|source| BootError::Defaults { source })?;

        if self.apply_factory_reset(&cfg, &loader).await {
            loader.apply_user_override(&mut cfg).await;
        }
        if let Some(level) = cfg.get_int("debug.level") {
            self.deps.platform.set_log_level(level);
        }

        let unique_id = self.deps.platform.unique_id();
        self.register_ro_vars(&unique_id);
        expand_config_placeholders(&mut cfg, &unique_id);

        self.deps
            .platform
            .init_platform(&cfg)
            .await
            .map_err(|source| BootError::PlatformInit { source })?;

        let live = Arc::new(cfg);
        let service = ConfigService::new(loader, Arc::clone(&live), Arc::clone(&self.deps.ro_vars));
        Ok((live, service))
    }

    /// Returns whether the user override may be applied.
    async fn apply_factory_reset(&self, defaults: &Config, loader: &ConfigLoader) -> bool {
        let Some(gpio) = defaults.get_int("debug.factory_reset_gpio") else {
            return true;
        };
        if gpio < 0 || !self.deps.platform.factory_reset_asserted(gpio) {
            return true;
        }
        match loader.remove_user_override().await {
            Ok(removed) => {
                warn!(gpio, removed, "factory reset requested; user overrides discarded");
                true
            }
            Err(err) => {
                error!(gpio, error = %err, "factory reset could not remove user overrides");
                false
            }
        }
    }

    fn register_ro_vars(&self, unique_id: &[u8]) {
        let build = BuildInfo::current();
        let registry = &self.deps.ro_vars;
        registry.register("fw_id", RoValue::new(build.id));
        registry.register("fw_timestamp", RoValue::new(build.timestamp));
        registry.register("fw_version", RoValue::new(build.version));
        registry.register("arch", RoValue::new(build.arch));
        registry.register("mac_address", RoValue::new(hex_id(unique_id)));
    }

    async fn start_listener(
        &self,
        live: &LiveConfig,
        service: &ConfigService,
    ) -> Result<Option<BoundServer>, BootError> {
        if !live.get_bool("http.enable").unwrap_or(false) {
            info!("http server disabled");
            return Ok(None);
        }
        let Some(addr) = live.get_str("http.listen_addr") else {
            return Err(BootError::Listener {
                source: ApiServerError::Bind {
                    addr: String::new(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "no listen address"),
                },
            });
        };
        ApiServer::new(service.clone(), Arc::clone(&self.deps.restarter))
            .bind(addr)
            .await
            .map(Some)
            .map_err(|source| BootError::Listener { source })
    }
}

/// Serve `device` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the server error if serving fails.
pub async fn serve_device<F>(device: Device, shutdown: F) -> Result<(), ApiServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match device.server {
        Some(server) => server.serve_until(shutdown).await,
        None => {
            shutdown.await;
            Ok(())
        }
    }
}
