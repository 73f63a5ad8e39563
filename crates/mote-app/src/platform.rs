//! Collaborators the boot sequence drives.
//!
//! # Design
//! - The orchestrator never touches hardware directly; every device effect
//!   goes through one of these traits so boot sequencing can be exercised
//!   with recording fakes.

use std::sync::Arc;

use async_trait::async_trait;
use mote_config::{Config, DeviceFs, LiveConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppInitError, PlatformError, UpdateError};

/// Filesystem image backing one firmware slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsLocation {
    /// Location of the image, relative to the device root.
    pub path: String,
    /// Image size in bytes; `0` when unknown.
    #[serde(default)]
    pub size: u64,
}

impl FsLocation {
    /// Location of unknown size.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: 0,
        }
    }
}

/// Persistent update state consulted at every boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    /// First boot after an update; success must commit it.
    #[serde(default)]
    pub is_first_boot: bool,
    /// An update was just flashed and still needs applying.
    #[serde(default)]
    pub fw_updated: bool,
    /// Slot the device boots from.
    #[serde(default)]
    pub current_slot: usize,
    /// Filesystem location of every slot.
    pub fs_locations: Vec<FsLocation>,
}

impl UpdateDescriptor {
    /// Single-slot descriptor with no pending update.
    #[must_use]
    pub fn single_slot(location: FsLocation) -> Self {
        Self {
            is_first_boot: false,
            fw_updated: false,
            current_slot: 0,
            fs_locations: vec![location],
        }
    }

    /// Location of the current slot, if the descriptor names one.
    #[must_use]
    pub fn current_location(&self) -> Option<&FsLocation> {
        self.fs_locations.get(self.current_slot)
    }

    /// Slot booted before the current one, if the device has more than one
    /// and the current slot is one of them.
    #[must_use]
    pub fn previous_slot(&self) -> Option<usize> {
        match self.fs_locations.len() {
            0 | 1 => None,
            slots if self.current_slot >= slots => None,
            slots => Some((self.current_slot + slots - 1) % slots),
        }
    }
}

/// Hardware and OS services.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Bring up diagnostic output. Cannot fail recoverably.
    fn init_diagnostics(&self);

    /// Mount the filesystem at `location`.
    async fn mount_fs(&self, location: &FsLocation) -> Result<Arc<dyn DeviceFs>, PlatformError>;

    /// Whether the factory-reset input on `gpio` is asserted.
    fn factory_reset_asserted(&self, gpio: i64) -> bool;

    /// Device-unique identifier, normally the MAC address.
    fn unique_id(&self) -> Vec<u8>;

    /// Configure platform services (network, time) from the loaded configuration.
    async fn init_platform(&self, cfg: &Config) -> Result<(), PlatformError>;

    /// Apply the configured `debug.level`.
    fn set_log_level(&self, level: i64);

    /// Arm the watchdog with `seconds`.
    fn set_watchdog_timeout(&self, seconds: i64);

    /// Restart the device.
    fn restart(&self);
}

/// Firmware update state machine.
#[async_trait]
pub trait Updater: Send + Sync {
    /// Current update descriptor.
    async fn descriptor(&self) -> Result<UpdateDescriptor, UpdateError>;

    /// Finish applying a freshly flashed update, e.g. migrate user files.
    async fn apply(&self, descriptor: &UpdateDescriptor) -> Result<(), UpdateError>;

    /// Make the running firmware permanent.
    async fn commit(&self) -> Result<(), UpdateError>;

    /// Roll back to the previous firmware at the next restart.
    async fn revert(&self) -> Result<(), UpdateError>;
}

/// The product application started last.
#[async_trait]
pub trait Application: Send + Sync {
    /// Start the application with the live configuration.
    async fn init(&self, cfg: &LiveConfig) -> Result<(), AppInitError>;
}
