//! Error type for `staffmode-service`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] staffmode_core::Error),

  #[error("store error: {0}")]
  Store(#[from] staffmode_store_yaml::Error),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
