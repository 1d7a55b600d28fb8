//! Service configuration.
//!
//! Read from an optional YAML file (`staff-mode.config.yml` by default),
//! overridden by `STAFFMODE__*` environment variables with `__` between
//! nested keys, e.g. `STAFFMODE__TASKS__REMINDER_MS=50`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use serde::Deserialize;
use staffmode_core::{registry::SnapshotRegistry, store::ProfileStore};
use staffmode_store_yaml::YamlFileBackend;

use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "staff-mode.config.yml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceConfig {
  #[serde(alias = "data_file")]
  pub data_file:          PathBuf,
  #[serde(alias = "backups_dir")]
  pub backups_dir:        PathBuf,
  /// Namespace of the default snapshot providers' keys.
  #[serde(alias = "provider_namespace")]
  pub provider_namespace: String,
  /// Top-level section of the data file; profiles live under
  /// `<document-root>.profiles`.
  #[serde(alias = "document_root")]
  pub document_root:      String,
  pub tasks:              TaskConfig,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      data_file:          PathBuf::from("data/survival-staff-mode.data.yml"),
      backups_dir:        PathBuf::from("backups"),
      provider_namespace: "survivalstaffmode".to_owned(),
      document_root:      "survival-staff-mode".to_owned(),
      tasks:              TaskConfig::default(),
    }
  }
}

/// Periods of the main loop's recurring tasks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TaskConfig {
  #[serde(alias = "demotion_sweep_ms")]
  pub demotion_sweep_ms: u64,
  #[serde(alias = "roster_refresh_ms")]
  pub roster_refresh_ms: u64,
  /// Capture and save every n-th roster refresh.
  #[serde(alias = "capture_every")]
  pub capture_every:     u64,
  #[serde(alias = "reminder_ms")]
  pub reminder_ms:       u64,
}

impl Default for TaskConfig {
  fn default() -> Self {
    Self {
      demotion_sweep_ms: 1_000,
      roster_refresh_ms: 30_000,
      capture_every:     4,
      reminder_ms:       100,
    }
  }
}

impl TaskConfig {
  pub fn demotion_sweep(&self) -> Duration { period(self.demotion_sweep_ms) }

  pub fn roster_refresh(&self) -> Duration { period(self.roster_refresh_ms) }

  pub fn reminder(&self) -> Duration { period(self.reminder_ms) }

  pub fn capture_every(&self) -> u64 { self.capture_every.max(1) }
}

/// Interval timers panic on a zero period.
fn period(ms: u64) -> Duration { Duration::from_millis(ms.max(1)) }

impl ServiceConfig {
  /// Layer the file at `path` (if it exists) and the environment over the
  /// defaults.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("STAFFMODE").separator("__"))
      .build()?;

    Ok(settings.try_deserialize()?)
  }

  pub fn backend(&self) -> YamlFileBackend {
    YamlFileBackend::new(&self.data_file, &self.backups_dir)
  }

  pub fn registry(&self) -> Result<SnapshotRegistry> {
    Ok(SnapshotRegistry::with_defaults(&self.provider_namespace)?)
  }

  /// An unloaded profile store over the configured data file.
  pub fn profile_store(&self) -> Result<ProfileStore> {
    Ok(ProfileStore::new(
      Arc::new(self.backend()),
      self.registry()?,
      &self.document_root,
    ))
  }
}
