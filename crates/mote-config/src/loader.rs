//! Layered configuration loading.
//!
//! # Design
//! - Layers merge in a fixed order: schema defaults, system defaults (`*`),
//!   application defaults and the optional vendor file (both under the
//!   declared `conf_acl`), then overrides.
//! - Each merge works on a scratch copy and only replaces the target once the
//!   whole source parsed, so a failed merge leaves the target untouched.
//! - Fields outside a source's rule are skipped without error; layers share
//!   superset files and overlapping keys are expected.

use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::acl;
use crate::defaults::ConfigPaths;
use crate::error::{ConfigError, ConfigResult};
use crate::fs::DeviceFs;
use crate::model::Config;
use crate::schema::{FieldDescriptor, FieldType, Schema, TypedValue};

/// Origin of the data merged by [`ConfigLoader::apply_override`].
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Named file on the device filesystem.
    File(&'a str),
    /// In-memory payload, e.g. a request body.
    Payload(&'a [u8]),
}

impl Source<'_> {
    fn origin(&self) -> &str {
        match self {
            Self::File(name) => name,
            Self::Payload(_) => "payload",
        }
    }
}

/// Merge serialised configuration data into `cfg` under `acl`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON and
/// [`ConfigError::TypeMismatch`] for values that do not fit the schema. `cfg`
/// is unchanged on error.
pub fn merge_bytes(cfg: &mut Config, data: &[u8], acl: &str, origin: &str) -> ConfigResult<()> {
    let value: Value = serde_json::from_slice(data).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    merge_json(cfg, &value, acl)
}

/// Merge a parsed JSON document into `cfg` under `acl`.
///
/// # Errors
///
/// Returns [`ConfigError::TypeMismatch`] when the document or one of its
/// permitted fields has the wrong type. `cfg` is unchanged on error.
pub fn merge_json(cfg: &mut Config, source: &Value, acl: &str) -> ConfigResult<()> {
    let Value::Object(map) = source else {
        return Err(ConfigError::TypeMismatch {
            path: String::new(),
            expected: FieldType::Object.as_str(),
        });
    };
    let mut scratch = cfg.clone();
    merge_object(&mut scratch, map, None, acl)?;
    *cfg = scratch;
    Ok(())
}

fn merge_object(
    cfg: &mut Config,
    map: &Map<String, Value>,
    prefix: Option<&str>,
    acl: &str,
) -> ConfigResult<()> {
    let schema = Arc::clone(cfg.schema());
    for (key, value) in map {
        let path = prefix.map_or_else(|| key.clone(), |prefix| format!("{prefix}.{key}"));
        let Some(field) = schema.get(&path) else {
            debug!(path = %path, "ignoring key not present in schema");
            continue;
        };
        if field.ty == FieldType::Object {
            if !subtree_permitted(&schema, &path, acl) {
                debug!(path = %path, "skipping object outside access rule");
                continue;
            }
            let Value::Object(nested) = value else {
                return Err(ConfigError::TypeMismatch {
                    path,
                    expected: FieldType::Object.as_str(),
                });
            };
            merge_object(cfg, nested, Some(&path), acl)?;
            continue;
        }
        if !permitted(field, acl) {
            debug!(path = %path, "skipping key outside access rule");
            continue;
        }
        let typed = TypedValue::from_json(field.ty, value, &path)?;
        cfg.set(&path, typed)?;
    }
    Ok(())
}

/// Whether `rule` permits at least one leaf below the object at `path`.
fn subtree_permitted(schema: &Schema, path: &str, rule: &str) -> bool {
    let prefix = format!("{path}.");
    schema.fields().iter().any(|field| {
        field.ty != FieldType::Object && field.path.starts_with(&prefix) && permitted(field, rule)
    })
}

fn permitted(field: &FieldDescriptor, rule: &str) -> bool {
    if field.sys_only {
        acl::is_unrestricted(rule)
    } else {
        acl::is_allowed(rule, &field.path)
    }
}

/// Reads configuration layers from the device filesystem.
#[derive(Clone)]
pub struct ConfigLoader {
    fs: Arc<dyn DeviceFs>,
    schema: Arc<Schema>,
    paths: ConfigPaths,
}

impl ConfigLoader {
    /// Loader over `fs` for configurations following `schema`.
    #[must_use]
    pub fn new(fs: Arc<dyn DeviceFs>, schema: Arc<Schema>, paths: ConfigPaths) -> Self {
        Self { fs, schema, paths }
    }

    /// Layer file names.
    #[must_use]
    pub const fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Underlying filesystem.
    #[must_use]
    pub fn fs(&self) -> &Arc<dyn DeviceFs> {
        &self.fs
    }

    /// Build the defaults: schema defaults, then system, application, and vendor layers.
    ///
    /// # Errors
    ///
    /// Returns an error if either mandatory defaults file cannot be read or
    /// parsed. Problems with the vendor file are logged and ignored.
    #[instrument(name = "config_loader.load_defaults", skip(self))]
    pub async fn load_defaults(&self) -> ConfigResult<Config> {
        let mut cfg = Config::from_schema(Arc::clone(&self.schema));
        self.apply_override(
            &mut cfg,
            Source::File(&self.paths.sys_defaults),
            acl::UNRESTRICTED,
        )
        .await?;

        let declared = cfg.conf_acl().to_string();
        self.apply_override(&mut cfg, Source::File(&self.paths.app_defaults), &declared)
            .await?;

        match self
            .apply_override(&mut cfg, Source::File(&self.paths.vendor), &declared)
            .await
        {
            Ok(()) => info!(path = %self.paths.vendor, "vendor defaults applied"),
            Err(err) if err.is_not_found() => debug!(path = %self.paths.vendor, "no vendor defaults"),
            Err(err) => warn!(path = %self.paths.vendor, error = %err, "ignoring vendor defaults"),
        }
        Ok(cfg)
    }

    /// Merge one more source into an already built configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if a file source cannot be read, or a
    /// parse error; `cfg` is unchanged on error.
    pub async fn apply_override(
        &self,
        cfg: &mut Config,
        source: Source<'_>,
        acl: &str,
    ) -> ConfigResult<()> {
        debug!(origin = source.origin(), "loading configuration source");
        match source {
            Source::File(name) => {
                let data = self.fs.read(name).await.map_err(|source| ConfigError::Read {
                    path: name.to_string(),
                    source,
                })?;
                merge_bytes(cfg, &data, acl, name).inspect_err(|err| {
                    warn!(path = %name, error = %err, "failed to parse configuration file");
                })
            }
            Source::Payload(data) => merge_bytes(cfg, data, acl, "payload"),
        }
    }

    /// Apply the user override file under the configuration's own `conf_acl`.
    ///
    /// Returns whether the file was applied. A missing or malformed override
    /// leaves `cfg` as it was.
    pub async fn apply_user_override(&self, cfg: &mut Config) -> bool {
        let declared = cfg.conf_acl().to_string();
        match self
            .apply_override(cfg, Source::File(&self.paths.user), &declared)
            .await
        {
            Ok(()) => {
                info!(path = %self.paths.user, "user overrides applied");
                true
            }
            Err(err) if err.is_not_found() => {
                debug!(path = %self.paths.user, "no user overrides");
                false
            }
            Err(err) => {
                warn!(path = %self.paths.user, error = %err, "ignoring user overrides");
                false
            }
        }
    }

    /// Persist `cfg` as the user override file, relative to `baseline`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persist`] if the file cannot be written.
    pub async fn persist_user_override(&self, cfg: &Config, baseline: &Config) -> ConfigResult<()> {
        let body = crate::model::render_string(&cfg.diff_json(baseline), true)?;
        self.fs
            .write(&self.paths.user, body.as_bytes())
            .await
            .map_err(|source| ConfigError::Persist {
                path: self.paths.user.clone(),
                source,
            })?;
        info!(path = %self.paths.user, "saved user overrides");
        Ok(())
    }

    /// Remove the user override file. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Remove`] if the file exists but cannot be removed.
    pub async fn remove_user_override(&self) -> ConfigResult<bool> {
        let remove_error = |source: io::Error| ConfigError::Remove {
            path: self.paths.user.clone(),
            source,
        };
        if !self.fs.exists(&self.paths.user).await.map_err(remove_error)? {
            return Ok(false);
        }
        match self.fs.remove(&self.paths.user).await {
            Ok(()) => {
                info!(path = %self.paths.user, "removed user overrides");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(remove_error(err)),
        }
    }
}
