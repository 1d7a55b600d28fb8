//! Runtime glue for survival staff mode: configuration, event dispatch, the
//! ancillary staff-mode effects, interaction protection, and the main loop that drives sessions and
//! periodic tasks.

pub mod config;
pub mod effects;
pub mod error;
pub mod events;
pub mod interactions;
pub mod runtime;

pub use config::{ServiceConfig, TaskConfig};
pub use effects::StaffModeEffects;
pub use error::{Error, Result};
pub use events::{EventDispatcher, Listener};
pub use interactions::{DeathOutcome, Interaction};
pub use runtime::{Command, run};

#[cfg(test)]
mod tests;
