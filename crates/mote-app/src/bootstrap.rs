//! Host bootstrap: environment, logging, boot, serve, restart.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mote_api::Restarter;
use mote_config::{ConfigPaths, RoVarRegistry};
use mote_telemetry::LoggingConfig;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::boot::{BootDependencies, BootOrchestrator, serve_device};
use crate::error::{AppError, AppResult};
use crate::host::{
    BootJsonUpdater, HostApplication, HostPlatform, HostSettings, RESTART_EXIT_CODE,
};
use crate::platform::Platform;

/// Dependencies required to bootstrap the firmware on a host.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    settings: HostSettings,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            settings: HostSettings::from_env()?,
        })
    }
}

/// How the firmware stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A restart was requested; the supervisor should start the firmware again.
    Restart,
    /// The process was interrupted.
    Exit,
}

impl Shutdown {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Restart => ExitCode::from(RESTART_EXIT_CODE),
            Self::Exit => ExitCode::SUCCESS,
        }
    }
}

/// Restart hook handed to the HTTP handlers; wakes the serve loop.
#[derive(Default)]
pub struct RestartSignal {
    notify: Notify,
    requested: AtomicBool,
}

impl RestartSignal {
    /// Wait until a restart is requested. Returns at once if one already was.
    pub async fn wait(&self) {
        if self.requested() {
            return;
        }
        self.notify.notified().await;
    }

    /// Whether a restart has been requested.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Restarter for RestartSignal {
    fn restart(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// Entry point for the firmware boot sequence.
///
/// # Errors
///
/// Returns an error if the environment is incomplete, logging cannot be
/// installed, or the HTTP server fails while serving.
pub async fn run_app() -> AppResult<Shutdown> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<Shutdown> {
    let BootstrapDependencies { logging, settings } = dependencies;
    let log_level = mote_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let platform = Arc::new(HostPlatform::new(settings.clone(), log_level));
    let signal = Arc::new(RestartSignal::default());
    let orchestrator = BootOrchestrator::new(BootDependencies {
        platform: platform.clone(),
        updater: Arc::new(BootJsonUpdater::new(&settings.device_root)),
        application: Arc::new(HostApplication),
        restarter: signal.clone(),
        ro_vars: RoVarRegistry::global(),
        paths: ConfigPaths::default(),
    });

    let Ok(device) = orchestrator.run().await else {
        return Ok(Shutdown::Restart);
    };

    serve_device(device, wait_for_shutdown(Arc::clone(&signal)))
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;

    if signal.requested() {
        platform.restart();
        info!("restarting");
        Ok(Shutdown::Restart)
    } else {
        info!("shutdown complete");
        Ok(Shutdown::Exit)
    }
}

async fn wait_for_shutdown(signal: Arc<RestartSignal>) {
    tokio::select! {
        () = signal.wait() => info!("restart signalled; draining connections"),
        () = interrupted() => info!("interrupt received"),
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "interrupt handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn restart_before_wait_is_not_lost() {
        let signal = RestartSignal::default();
        signal.restart();
        assert!(signal.requested());
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("wait returns");
    }

    #[tokio::test]
    async fn waiter_wakes_on_restart() {
        let signal = Arc::new(RestartSignal::default());
        let waiter = tokio::spawn({
            let signal = Arc::clone(&signal);
            async move { signal.wait().await }
        });
        tokio::task::yield_now().await;
        signal.restart();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .expect("waiter joined");
    }

    #[test]
    fn shutdown_maps_to_exit_codes() {
        assert_eq!(Shutdown::Restart.exit_code(), ExitCode::from(RESTART_EXIT_CODE));
        assert_eq!(Shutdown::Exit.exit_code(), ExitCode::SUCCESS);
    }
}
