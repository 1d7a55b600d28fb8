//! Core types and the mode-toggle engine for survival staff mode.
//!
//! A staff member switches between two mutually exclusive gameplay contexts,
//! [`Mode::Survival`] and [`Mode::Staff`]. Each switch captures the current
//! context's gameplay state through the registered snapshot providers,
//! persists it, and restores whatever was saved for the other context.
//!
//! This crate owns no file I/O and no game integration. Live subjects, the
//! event bus and the document backend are traits implemented by the host.

pub mod document;
pub mod error;
pub mod events;
pub mod gameplay;
pub mod manager;
pub mod mode;
pub mod profile;
pub mod providers;
pub mod registry;
pub mod roster;
pub mod snapshot;
pub mod store;
pub mod subject;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use mode::Mode;
