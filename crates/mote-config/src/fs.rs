//! Named-file storage backing the configuration layers.
//!
//! # Design
//! - [`DeviceFs`] is the seam to the flash filesystem: flat, named files.
//! - [`DirFs`] maps it onto a host directory and replaces files atomically
//!   (write to a temporary name, then rename), so a failed write never
//!   leaves a truncated configuration file behind.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

/// Flat, named-file storage provided by the platform.
#[async_trait]
pub trait DeviceFs: Send + Sync {
    /// Read the whole file.
    async fn read(&self, name: &str) -> io::Result<Vec<u8>>;
    /// Create or replace the file with `data`.
    async fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;
    /// Remove the file.
    async fn remove(&self, name: &str) -> io::Result<()>;
    /// Whether the file exists.
    async fn exists(&self, name: &str) -> io::Result<bool>;
}

/// [`DeviceFs`] rooted in a host directory.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Use `root` as the filesystem root. The directory must exist.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file names must be plain, non-empty names",
            ));
        }
        Ok(self.root.join(name))
    }
}

/// Whether `name` is a single path component that cannot escape the root.
#[must_use]
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[async_trait]
impl DeviceFs for DirFs {
    async fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(name)?).await
    }

    async fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let target = self.resolve(name)?;
        let staging = self.root.join(format!(".{name}.tmp"));
        fs::write(&staging, data).await?;
        if let Err(err) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err);
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(name)?).await
    }

    async fn exists(&self, name: &str) -> io::Result<bool> {
        fs::try_exists(self.resolve(name)?).await
    }
}
