//! The two gameplay contexts a staff member can be in.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Exactly two modes exist and each is the other's opposite.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
  Survival,
  Staff,
}

impl Mode {
  /// The counterpart mode. `m.toggle().toggle() == m` for every mode.
  pub const fn toggle(self) -> Self {
    match self {
      Self::Survival => Self::Staff,
      Self::Staff => Self::Survival,
    }
  }

  /// The name used in the persisted document (`"SURVIVAL"` / `"STAFF"`).
  pub fn name(self) -> &'static str {
    match self {
      Self::Survival => "SURVIVAL",
      Self::Staff => "STAFF",
    }
  }
}
