//! YAML file backend for the staff mode profile store.
//!
//! The whole document lives in one file. Writes go to a sibling temporary
//! file that is then renamed over the original, so a crash mid-write leaves
//! the previous contents in place.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::YamlFileBackend;

#[cfg(test)]
mod tests;
