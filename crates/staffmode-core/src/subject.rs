//! Subjects — the people a profile belongs to — and the live-handle contract.
//!
//! A subject is identified by a stable [`Uuid`] whether or not they are
//! currently present. While present, the host exposes a [`LiveSubject`]
//! through its [`Directory`]; handles are resolved on demand and never
//! retained by the engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Externally granted flags consulted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
  /// The subject may use staff mode at all.
  StaffMember,
  /// Administrative override: the subject's effective mode is forced to
  /// [`Mode::Staff`](crate::Mode::Staff) while held.
  StaffModeActive,
  Admin,
}

impl Capability {
  /// The permission node the host checks for this capability.
  pub fn node(self) -> &'static str {
    match self {
      Self::StaffMember => "survivalstaffmode.staff",
      Self::StaffModeActive => "survivalstaffmode.enabled",
      Self::Admin => "survivalstaffmode.admin",
    }
  }
}

// ─── Facets ──────────────────────────────────────────────────────────────────

/// The host's game mode, distinct from staff [`Mode`](crate::Mode).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
  Survival,
  Creative,
  Adventure,
  Spectator,
}

/// Health, hunger and experience.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
  pub level:           i32,
  /// Progress towards the next level, `0.0..=1.0`.
  pub exp:             f32,
  pub health:          f64,
  #[serde(rename = "hunger")]
  pub food_level:      i32,
  pub saturation:      f32,
  /// Ticks since the subject last slept.
  #[serde(rename = "insomnia")]
  pub time_since_rest: i32,
}

impl Vitals {
  /// A reset state, almost as if respawning.
  pub const HEALTHY: Self = Self {
    level:           0,
    exp:             0.0,
    health:          20.0,
    food_level:      20,
    saturation:      5.0,
    time_since_rest: 0,
  };
}

impl Default for Vitals {
  fn default() -> Self { Self::HEALTHY }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub x:     f64,
  pub y:     f64,
  pub z:     f64,
  #[serde(default)]
  pub yaw:   f32,
  #[serde(default)]
  pub pitch: f32,
}

/// A location in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub world:       String,
  pub coordinates: Coordinates,
}

/// A single item stack in the host's own serialised form.
///
/// The engine never interprets these bytes; it only moves them between the
/// live subject and the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack(pub Bytes);

/// Slot contents of a subject's inventory. `None` marks an empty slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
  pub main:  Vec<Option<ItemStack>>,
  pub armor: Vec<Option<ItemStack>>,
  pub extra: Vec<Option<ItemStack>>,
}

impl Inventory {
  pub fn empty() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool {
    [&self.main, &self.armor, &self.extra]
      .into_iter()
      .all(|slots| slots.iter().all(Option::is_none))
  }
}

/// An active status effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionEffect {
  /// The host's effect type name, e.g. `"night_vision"`.
  #[serde(rename = "effect")]
  pub kind:      String,
  /// Remaining duration in ticks.
  pub duration:  i32,
  pub amplifier: i32,
  #[serde(default)]
  pub ambient:   bool,
  #[serde(default = "default_true")]
  pub particles: bool,
  #[serde(default = "default_true")]
  pub icon:      bool,
}

fn default_true() -> bool { true }

impl PotionEffect {
  /// Thirty minutes of night vision, replenished while in staff mode.
  pub fn night_vision() -> Self {
    Self {
      kind:      "night_vision".to_owned(),
      duration:  30 * 60 * 20,
      amplifier: 3,
      ambient:   false,
      particles: true,
      icon:      true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flight {
  pub allowed: bool,
  pub flying:  bool,
}

// ─── Live handle ─────────────────────────────────────────────────────────────

/// Failures reported by the host while mutating a live subject.
#[derive(Debug, Error)]
pub enum SubjectError {
  #[error("world {0:?} is not loaded")]
  WorldNotLoaded(String),

  #[error("rejected by host: {0}")]
  Rejected(String),
}

/// A subject who is currently present.
///
/// Every setter fully overwrites the facet it touches.
pub trait LiveSubject {
  fn id(&self) -> Uuid;

  fn name(&self) -> &str;

  fn has_capability(&self, capability: Capability) -> bool;

  fn vitals(&self) -> Vitals;

  fn set_vitals(&mut self, vitals: &Vitals) -> Result<(), SubjectError>;

  fn position(&self) -> Position;

  fn teleport(&mut self, position: &Position) -> Result<(), SubjectError>;

  fn inventory(&self) -> Inventory;

  fn clear_inventory(&mut self);

  fn set_inventory(&mut self, inventory: &Inventory);

  fn potion_effects(&self) -> Vec<PotionEffect>;

  fn remove_potion_effect(&mut self, kind: &str);

  fn add_potion_effect(&mut self, effect: &PotionEffect);

  fn flight(&self) -> Flight;

  fn set_flight(&mut self, flight: Flight);

  fn game_mode(&self) -> GameMode;

  fn set_game_mode(&mut self, mode: GameMode);

  fn send_message(&mut self, message: &str);

  fn send_action_bar(&mut self, message: &str);

  /// Make every nearby hostile mob currently targeting this subject drop
  /// its target.
  fn clear_mob_targets(&mut self);
}

/// Resolves subject identities to live handles.
pub trait Directory {
  fn subject(&self, id: Uuid) -> Option<&dyn LiveSubject>;

  /// The live handle for `id`, or `None` if the subject is not present.
  fn subject_mut(&mut self, id: Uuid) -> Option<&mut dyn LiveSubject>;

  /// Identities of every subject currently present.
  fn online(&self) -> Vec<Uuid>;
}
