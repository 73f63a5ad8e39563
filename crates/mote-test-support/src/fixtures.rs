//! Disposable device filesystem images for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

/// System defaults file name on a device image.
pub const SYS_DEFAULTS: &str = "conf_sys_defaults.json";
/// Application defaults file name on a device image.
pub const APP_DEFAULTS: &str = "conf_app_defaults.json";
/// Vendor defaults file name on a device image.
pub const VENDOR: &str = "conf_vendor.json";
/// User override file name on a device image.
pub const USER: &str = "conf.json";

/// Access rule declared by [`DeviceFixture::standard`].
pub const STANDARD_ACL: &str = "wifi.*,debug.level,http.*";

/// Temporary directory standing in for a mounted device filesystem.
///
/// The directory is removed when the fixture is dropped.
pub struct DeviceFixture {
    dir: TempDir,
}

impl DeviceFixture {
    /// Empty image without any configuration layers.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn empty() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create device image directory")?;
        Ok(Self { dir })
    }

    /// Image seeded with the given system and application defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or either file cannot be created.
    pub fn with_defaults(sys: &Value, app: &Value) -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.write_json(SYS_DEFAULTS, sys)?;
        fixture.write_json(APP_DEFAULTS, app)?;
        Ok(fixture)
    }

    /// Image with representative defaults: the system layer declares
    /// [`STANDARD_ACL`] and the application layer adjusts a few fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be written.
    pub fn standard() -> Result<Self> {
        Self::with_defaults(&standard_sys_defaults(), &standard_app_defaults())
    }

    /// Root directory of the image.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `name` inside the image.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, name: &str, value: &Value) -> Result<()> {
        let body = serde_json::to_vec_pretty(value).context("failed to encode fixture json")?;
        self.write_raw(name, &body)
    }

    /// Write raw bytes, e.g. deliberately malformed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_raw(&self, name: &str, body: &[u8]) -> Result<()> {
        fs::write(self.path(name), body).with_context(|| format!("failed to write {name}"))
    }

    /// Read and parse a JSON document from the image.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid JSON.
    pub fn read_json(&self, name: &str) -> Result<Value> {
        let body = fs::read(self.path(name)).with_context(|| format!("failed to read {name}"))?;
        serde_json::from_slice(&body).with_context(|| format!("{name} is not valid json"))
    }

    /// Whether `name` exists in the image.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Delete `name` from the image if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                Err(err).with_context(|| format!("failed to remove {name}"))
            }
            _ => Ok(()),
        }
    }
}

/// System defaults used by [`DeviceFixture::standard`].
#[must_use]
pub fn standard_sys_defaults() -> Value {
    json!({
        "conf_acl": STANDARD_ACL,
        "wifi": { "ap": { "ssid": "Mote_??????", "channel": 6 } },
        "sys": { "wdt_timeout": 20 }
    })
}

/// Application defaults used by [`DeviceFixture::standard`].
#[must_use]
pub fn standard_app_defaults() -> Value {
    json!({
        "wifi": { "ap": { "channel": 1 } },
        "debug": { "level": 3 },
        "http": { "listen_addr": "127.0.0.1:0" }
    })
}
