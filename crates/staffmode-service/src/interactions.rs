//! Interactions the host must suppress for staff members in staff mode.
//!
//! The host asks before letting an interaction through. Damage is also
//! suppressed for a short while after any toggle, see
//! [`TOGGLE_COOLDOWN`](staffmode_core::manager::TOGGLE_COOLDOWN).

use chrono::{DateTime, Utc};
use staffmode_core::{
  events::EventBus,
  manager::StaffModeManager,
  subject::{Directory, Flight},
};
use uuid::Uuid;

/// Something about to happen to a subject that staff mode may cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
  Damage,
  /// The food level is about to drop.
  Hunger,
  /// A mob is about to pick the subject as its target.
  MobTarget,
  /// The time-since-rest statistic is about to change.
  Insomnia { previous: i64, next: i64 },
  /// An advancement criterion is about to be granted.
  Advancement,
}

/// How the host resolves a death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathOutcome {
  pub keep_inventory:     bool,
  pub keep_level:         bool,
  pub drop_items:         bool,
  pub dropped_experience: u32,
}

impl DeathOutcome {
  /// Nothing is lost and nothing drops.
  pub const KEEP_EVERYTHING: Self =
    Self { keep_inventory: true, keep_level: true, drop_items: false, dropped_experience: 0 };
}

/// Whether the host should cancel `interaction` for `id` at `now`.
pub fn should_cancel<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  id: Uuid,
  interaction: Interaction,
  now: DateTime<Utc>,
) -> bool {
  match interaction {
    Interaction::Damage => manager.is_protected(id, now),
    // Sleeping resets the statistic; that is never blocked.
    Interaction::Insomnia { previous, next } if next < previous => false,
    Interaction::Hunger
    | Interaction::MobTarget
    | Interaction::Insomnia { .. }
    | Interaction::Advancement => manager.is_in_staff_mode(id),
  }
}

/// The death outcome to force for `id`, or `None` to let the host's own
/// rules apply.
pub fn on_death<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  id: Uuid,
) -> Option<DeathOutcome> {
  manager.is_in_staff_mode(id).then_some(DeathOutcome::KEEP_EVERYTHING)
}

/// Called once a game mode change has taken effect. Switching game modes
/// resets flight, so a staff member in staff mode gets it back.
///
/// Returns `true` if flight was re-enabled.
pub fn after_game_mode_change<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  id: Uuid,
) -> bool {
  if !manager.is_in_staff_mode(id) {
    return false;
  }
  let Some(subject) = manager.directory_mut().subject_mut(id) else {
    return false;
  };
  subject.set_flight(Flight { allowed: true, flying: true });
  true
}
