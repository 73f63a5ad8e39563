//! Host implementations of the platform collaborators.
//!
//! A directory on the host stands in for the flash chip: every firmware slot
//! is a subdirectory named by the update descriptor, and the descriptor
//! itself lives in `boot.json` at the device root.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use mote_config::{Config, DeviceFs, DirFs, LiveConfig};
use mote_telemetry::{BuildInfo, LogLevelHandle};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppInitError, AppResult, PlatformError, UpdateError};
use crate::platform::{Application, FsLocation, Platform, UpdateDescriptor, Updater};

/// Update descriptor file at the device root.
pub const BOOT_STATE_FILE: &str = "boot.json";

/// Process exit code asking the supervisor to start the firmware again.
pub const RESTART_EXIT_CODE: u8 = 3;

const DEFAULT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

/// Host settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Directory standing in for the flash chip.
    pub device_root: PathBuf,
    /// Whether the factory-reset input reads as asserted.
    pub factory_reset: bool,
    /// Device MAC address.
    pub mac_address: [u8; 6],
}

impl HostSettings {
    /// Read `MOTE_DEVICE_ROOT`, `MOTE_FACTORY_RESET`, and `MOTE_MAC_ADDRESS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device root is unset or the MAC address is malformed.
    pub fn from_env() -> AppResult<Self> {
        let device_root = std::env::var_os("MOTE_DEVICE_ROOT")
            .map(PathBuf::from)
            .ok_or(AppError::MissingEnv {
                name: "MOTE_DEVICE_ROOT",
            })?;
        let factory_reset = env_flag_value(std::env::var("MOTE_FACTORY_RESET").ok().as_deref());
        let mac_address = match std::env::var("MOTE_MAC_ADDRESS") {
            Ok(value) => parse_mac(&value).ok_or(AppError::InvalidEnv {
                name: "MOTE_MAC_ADDRESS",
                value,
            })?,
            Err(_) => DEFAULT_MAC,
        };
        Ok(Self {
            device_root,
            factory_reset,
            mac_address,
        })
    }
}

fn env_flag_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Parse 12 hex digits, optionally separated by `:` or `-`.
fn parse_mac(value: &str) -> Option<[u8; 6]> {
    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, ':' | '-'))
        .collect();
    if digits.len() != 12 || !digits.is_ascii() {
        return None;
    }
    let mut mac = [0u8; 6];
    for (slot, pair) in mac.iter_mut().zip(digits.as_bytes().chunks(2)) {
        let pair = std::str::from_utf8(pair).ok()?;
        *slot = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(mac)
}

/// Platform backed by a host directory.
pub struct HostPlatform {
    settings: HostSettings,
    log_level: LogLevelHandle,
    watchdog_seconds: AtomicI64,
    restart_requested: AtomicBool,
}

impl HostPlatform {
    /// Platform over `settings`, adjusting log levels through `log_level`.
    #[must_use]
    pub const fn new(settings: HostSettings, log_level: LogLevelHandle) -> Self {
        Self {
            settings,
            log_level,
            watchdog_seconds: AtomicI64::new(0),
            restart_requested: AtomicBool::new(false),
        }
    }

    /// Whether a restart has been requested.
    #[must_use]
    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Watchdog timeout last armed, `0` if never.
    #[must_use]
    pub fn watchdog_seconds(&self) -> i64 {
        self.watchdog_seconds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for HostPlatform {
    fn init_diagnostics(&self) {
        let build = BuildInfo::current();
        info!(
            fw_id = build.id,
            fw_version = build.version,
            arch = build.arch,
            root = %self.settings.device_root.display(),
            "mote starting"
        );
    }

    async fn mount_fs(&self, location: &FsLocation) -> Result<Arc<dyn DeviceFs>, PlatformError> {
        let path = self.settings.device_root.join(&location.path);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|source| PlatformError::Mount {
                path: path.clone(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(PlatformError::Mount {
                path,
                source: io::Error::new(io::ErrorKind::NotADirectory, "slot is not a directory"),
            });
        }
        Ok(Arc::new(DirFs::new(path)))
    }

    fn factory_reset_asserted(&self, gpio: i64) -> bool {
        debug!(gpio, asserted = self.settings.factory_reset, "factory reset input read");
        self.settings.factory_reset
    }

    fn unique_id(&self) -> Vec<u8> {
        self.settings.mac_address.to_vec()
    }

    async fn init_platform(&self, cfg: &Config) -> Result<(), PlatformError> {
        if cfg.get_bool("wifi.ap.enable") == Some(true) {
            let channel = cfg.get_int("wifi.ap.channel").unwrap_or_default();
            if !(1..=14).contains(&channel) {
                return Err(PlatformError::Service {
                    service: "wifi.ap",
                    reason: format!("channel {channel} out of range"),
                });
            }
            info!(ssid = cfg.get_str("wifi.ap.ssid").unwrap_or(""), channel, "access point configured");
        }
        if cfg.get_bool("wifi.sta.enable") == Some(true) {
            info!(ssid = cfg.get_str("wifi.sta.ssid").unwrap_or(""), "station configured");
        }
        Ok(())
    }

    fn set_log_level(&self, level: i64) {
        if let Err(err) = self.log_level.apply_debug_level(level) {
            warn!(level, error = %err, "failed to apply debug level");
        }
    }

    fn set_watchdog_timeout(&self, seconds: i64) {
        self.watchdog_seconds.store(seconds, Ordering::SeqCst);
        info!(seconds, "watchdog armed");
    }

    fn restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
        info!("restart requested");
    }
}

/// Updater persisting its descriptor as `boot.json` at the device root.
///
/// Without `boot.json` the device runs a single slot rooted at the device
/// directory itself.
pub struct BootJsonUpdater {
    root: PathBuf,
}

impl BootJsonUpdater {
    /// Updater for the device at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn state_path(&self) -> PathBuf {
        self.root.join(BOOT_STATE_FILE)
    }

    async fn store(&self, descriptor: &UpdateDescriptor) -> Result<(), UpdateError> {
        let path = self.state_path();
        let body = serde_json::to_vec_pretty(descriptor).map_err(|source| UpdateError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body)
            .await
            .map_err(|source| UpdateError::Write { path, source })
    }

    fn slot_dir(&self, descriptor: &UpdateDescriptor, slot: usize) -> Result<PathBuf, UpdateError> {
        descriptor
            .fs_locations
            .get(slot)
            .map(|location| self.root.join(&location.path))
            .ok_or(UpdateError::UnknownSlot { slot })
    }
}

#[async_trait]
impl Updater for BootJsonUpdater {
    async fn descriptor(&self) -> Result<UpdateDescriptor, UpdateError> {
        let path = self.state_path();
        match fs::read(&path).await {
            Ok(body) => {
                serde_json::from_slice(&body).map_err(|source| UpdateError::Parse { path, source })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(UpdateDescriptor::single_slot(FsLocation::new(".")))
            }
            Err(source) => Err(UpdateError::Read { path, source }),
        }
    }

    /// Copy files present only in the previous slot into the current one and
    /// mark the next boot as the first one. `fw_updated` stays set until the
    /// update is committed or reverted.
    async fn apply(&self, descriptor: &UpdateDescriptor) -> Result<(), UpdateError> {
        let Some(previous) = descriptor.previous_slot() else {
            return Ok(());
        };
        let from = self.slot_dir(descriptor, previous)?;
        let to = self.slot_dir(descriptor, descriptor.current_slot)?;
        let migrated = migrate_files(&from, &to).await?;
        let mut applied = descriptor.clone();
        applied.is_first_boot = true;
        self.store(&applied).await?;
        info!(migrated, "update applied");
        Ok(())
    }

    async fn commit(&self) -> Result<(), UpdateError> {
        let mut descriptor = self.descriptor().await?;
        descriptor.is_first_boot = false;
        descriptor.fw_updated = false;
        self.store(&descriptor).await
    }

    async fn revert(&self) -> Result<(), UpdateError> {
        let mut descriptor = self.descriptor().await?;
        if let Some(previous) = descriptor.previous_slot() {
            descriptor.current_slot = previous;
        }
        descriptor.is_first_boot = false;
        descriptor.fw_updated = false;
        self.store(&descriptor).await
    }
}

async fn migrate_files(from: &Path, to: &Path) -> Result<usize, UpdateError> {
    let read_error = |source: io::Error| UpdateError::Read {
        path: from.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(from).await.map_err(read_error)?;
    let mut migrated = 0;
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        let file_type = entry.file_type().await.map_err(read_error)?;
        if !file_type.is_file() {
            continue;
        }
        let target = to.join(entry.file_name());
        if fs::try_exists(&target).await.unwrap_or(true) {
            continue;
        }
        fs::copy(entry.path(), &target)
            .await
            .map_err(|source| UpdateError::Write {
                path: target.clone(),
                source,
            })?;
        debug!(file = %target.display(), "migrated file");
        migrated += 1;
    }
    Ok(migrated)
}

/// Application that only reports what it was started with.
#[derive(Debug, Default)]
pub struct HostApplication;

#[async_trait]
impl Application for HostApplication {
    async fn init(&self, cfg: &LiveConfig) -> Result<(), AppInitError> {
        if cfg.get_bool("debug.enable_prompt") == Some(true) {
            debug!("debug prompt enabled");
        }
        info!(
            http = cfg.get_bool("http.enable").unwrap_or(false),
            sta = cfg.get_bool("wifi.sta.enable").unwrap_or(false),
            "application initialised"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mote_config::Schema;
    use tempfile::TempDir;

    #[test]
    fn env_flag_handles_truthy_and_falsey() {
        assert!(env_flag_value(Some("1")));
        assert!(env_flag_value(Some(" Yes ")));
        assert!(!env_flag_value(Some("0")));
        assert!(!env_flag_value(None));
    }

    #[test]
    fn mac_addresses_parse_with_or_without_separators() {
        let expected = [0x5C, 0xCF, 0x7F, 0x01, 0xA2, 0xB3];
        assert_eq!(parse_mac("5CCF7F01A2B3"), Some(expected));
        assert_eq!(parse_mac("5c:cf:7f:01:a2:b3"), Some(expected));
        assert_eq!(parse_mac("5C-CF-7F-01-A2-B3"), Some(expected));
        assert_eq!(parse_mac("5CCF7F01A2"), None);
        assert_eq!(parse_mac("5CCF7F01A2ZZ"), None);
        assert_eq!(parse_mac("5CCF7F01A2é"), None);
    }

    fn two_slot_descriptor() -> UpdateDescriptor {
        UpdateDescriptor {
            is_first_boot: false,
            fw_updated: true,
            current_slot: 1,
            fs_locations: vec![FsLocation::new("fs0"), FsLocation::new("fs1")],
        }
    }

    #[tokio::test]
    async fn missing_boot_state_means_single_slot() -> Result<(), UpdateError> {
        let dir = TempDir::new().map_err(|source| UpdateError::Read {
            path: PathBuf::new(),
            source,
        })?;
        let updater = BootJsonUpdater::new(dir.path());
        let descriptor = updater.descriptor().await?;
        assert_eq!(descriptor, UpdateDescriptor::single_slot(FsLocation::new(".")));
        Ok(())
    }

    #[tokio::test]
    async fn apply_migrates_user_files_then_commit_clears_flags() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("fs0"))?;
        std::fs::create_dir(dir.path().join("fs1"))?;
        std::fs::write(dir.path().join("fs0/conf.json"), b"{\"debug\":{\"level\":1}}")?;
        std::fs::write(dir.path().join("fs0/index.html"), b"old")?;
        std::fs::write(dir.path().join("fs1/index.html"), b"new")?;

        let updater = BootJsonUpdater::new(dir.path());
        updater.store(&two_slot_descriptor()).await?;
        let descriptor = updater.descriptor().await?;
        updater.apply(&descriptor).await?;

        assert!(dir.path().join("fs1/conf.json").exists());
        assert_eq!(std::fs::read(dir.path().join("fs1/index.html"))?, b"new");
        let applied = updater.descriptor().await?;
        assert!(applied.is_first_boot);
        assert!(applied.fw_updated);

        updater.commit().await?;
        let committed = updater.descriptor().await?;
        assert!(!committed.is_first_boot);
        assert!(!committed.fw_updated);
        assert_eq!(committed.current_slot, 1);
        Ok(())
    }

    #[tokio::test]
    async fn applied_update_still_reverts_when_the_next_boot_fails() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("fs0"))?;
        std::fs::create_dir(dir.path().join("fs1"))?;

        let updater = BootJsonUpdater::new(dir.path());
        updater.store(&two_slot_descriptor()).await?;
        updater.apply(&updater.descriptor().await?).await?;

        let next_boot = updater.descriptor().await?;
        assert!(next_boot.fw_updated);
        updater.apply(&next_boot).await?;
        updater.revert().await?;

        let reverted = updater.descriptor().await?;
        assert_eq!(reverted.current_slot, 0);
        assert!(!reverted.fw_updated);
        assert!(!reverted.is_first_boot);
        Ok(())
    }

    #[tokio::test]
    async fn revert_with_corrupt_slot_keeps_the_slot() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let updater = BootJsonUpdater::new(dir.path());
        let mut corrupt = two_slot_descriptor();
        corrupt.current_slot = usize::MAX;
        updater.store(&corrupt).await?;
        updater.revert().await?;
        let reverted = updater.descriptor().await?;
        assert_eq!(reverted.current_slot, usize::MAX);
        assert!(!reverted.fw_updated);
        Ok(())
    }

    #[tokio::test]
    async fn revert_switches_back_to_previous_slot() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let updater = BootJsonUpdater::new(dir.path());
        updater.store(&two_slot_descriptor()).await?;
        updater.revert().await?;
        let reverted = updater.descriptor().await?;
        assert_eq!(reverted.current_slot, 0);
        assert!(!reverted.fw_updated);
        Ok(())
    }

    #[tokio::test]
    async fn mount_requires_an_existing_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::create_dir(dir.path().join("fs0"))?;
        let platform = HostPlatform::new(
            HostSettings {
                device_root: dir.path().to_path_buf(),
                factory_reset: false,
                mac_address: DEFAULT_MAC,
            },
            LogLevelHandle::detached(),
        );
        assert!(platform.mount_fs(&FsLocation::new("fs0")).await.is_ok());
        assert!(matches!(
            platform.mount_fs(&FsLocation::new("fs9")).await,
            Err(PlatformError::Mount { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn platform_rejects_out_of_range_channel() -> anyhow::Result<()> {
        let platform = HostPlatform::new(
            HostSettings {
                device_root: PathBuf::from("."),
                factory_reset: false,
                mac_address: DEFAULT_MAC,
            },
            LogLevelHandle::detached(),
        );
        let mut cfg = Config::from_schema(Schema::device());
        platform.init_platform(&cfg).await?;
        cfg.set("wifi.ap.channel", mote_config::TypedValue::Int(42))?;
        assert!(platform.init_platform(&cfg).await.is_err());

        platform.set_watchdog_timeout(30);
        platform.restart();
        assert_eq!(platform.watchdog_seconds(), 30);
        assert!(platform.restart_requested());
        Ok(())
    }
}
