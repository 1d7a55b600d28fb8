//! [`YamlFileBackend`] — the YAML file implementation of [`DocumentBackend`].

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use chrono::Utc;
use serde_json::Value;
use staffmode_core::{
  document::Document,
  error::BackendError,
  store::DocumentBackend,
};

use crate::{Error, Result};

/// Timestamp format used in backup file names.
const BACKUP_STAMP: &str = "%Y-%m-%d_%H-%M-%S%.3f";

/// A document persisted as a single YAML file, with timestamped backups
/// written to a separate directory.
#[derive(Debug, Clone)]
pub struct YamlFileBackend {
  path:        PathBuf,
  backups_dir: PathBuf,
}

impl YamlFileBackend {
  pub fn new(path: impl Into<PathBuf>, backups_dir: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), backups_dir: backups_dir.into() }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn backups_dir(&self) -> &Path { &self.backups_dir }

  /// Read and parse the file. A missing file is `None`; an empty one is an
  /// empty document.
  pub fn read(&self) -> Result<Option<Document>> {
    let contents = match fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(Error::io(&self.path, e)),
    };

    Ok(Some(parse(&contents)?))
  }

  /// Replace the file's contents, creating parent directories as needed.
  pub fn write_str(&self, rendered: &str) -> Result<()> {
    let parent = self
      .path
      .parent()
      .ok_or_else(|| Error::NoParent(self.path.clone()))?;
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut staging = self.path.clone().into_os_string();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, rendered).map_err(|e| Error::io(&staging, e))?;
    fs::rename(&staging, &self.path).map_err(|e| Error::io(&self.path, e))?;
    Ok(())
  }

  /// Copy the current file to `<backups>/<stem>.<label>.<timestamp>.yml`.
  pub fn backup_copy(&self, label: &str) -> Result<Option<PathBuf>> {
    if !self.path.exists() {
      return Ok(None);
    }

    fs::create_dir_all(&self.backups_dir).map_err(|e| Error::io(&self.backups_dir, e))?;

    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "data".to_owned());
    let name = format!("{stem}.{label}.{}.yml", Utc::now().format(BACKUP_STAMP));
    let target = self.backups_dir.join(name);

    fs::copy(&self.path, &target).map_err(|e| Error::io(&target, e))?;
    tracing::info!(backup = %target.display(), "backed up {}", self.path.display());
    Ok(Some(target))
  }
}

/// Parse YAML text into a document.
pub(crate) fn parse(contents: &str) -> Result<Document> {
  if contents.trim().is_empty() {
    return Ok(Document::new());
  }
  let value: Value = serde_yaml::from_str(contents)?;
  Ok(Document::from_value(value)?)
}

/// Render a document as YAML text.
pub(crate) fn render(document: &Document) -> Result<String> {
  Ok(serde_yaml::to_string(&document.to_value())?)
}

impl DocumentBackend for YamlFileBackend {
  fn load(&self) -> Result<Option<Document>, BackendError> { Ok(self.read()?) }

  fn render(&self, document: &Document) -> Result<String, BackendError> { Ok(render(document)?) }

  fn write(&self, rendered: &str) -> Result<(), BackendError> { Ok(self.write_str(rendered)?) }

  fn backup(&self, label: &str) -> Result<Option<PathBuf>, BackendError> {
    Ok(self.backup_copy(label)?)
  }
}
