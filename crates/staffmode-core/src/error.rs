//! Error types for `staffmode-core`.

use thiserror::Error;

use crate::snapshot::{ProviderKey, SnapshotKind};

/// Boxed error returned by [`DocumentBackend`](crate::store::DocumentBackend)
/// implementations.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("snapshot provider already registered: {0}")]
  DuplicateProvider(ProviderKey),

  #[error("a provider for snapshot kind {0} is already registered")]
  DuplicateKind(SnapshotKind),

  #[error("snapshot kind {0} cannot be registered")]
  NotRegistrable(SnapshotKind),

  #[error("invalid provider key: {0:?}")]
  InvalidProviderKey(String),

  #[error("document root is not a mapping")]
  NotAMapping,

  #[error("document backend error: {0}")]
  Backend(#[source] BackendError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
