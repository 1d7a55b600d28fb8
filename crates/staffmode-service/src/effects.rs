//! [`StaffModeEffects`] — what entering and leaving staff mode does beyond
//! swapping snapshots.

use staffmode_core::{
  Mode,
  events::{ModeChanged, StaffModeEvent},
  subject::{Flight, GameMode, PotionEffect, Vitals},
};

use crate::events::Listener;

pub const ENABLED_MESSAGE: &str = "Staff mode enabled.";
pub const DISABLED_MESSAGE: &str = "Staff mode disabled.";

#[derive(Debug, Default, Clone, Copy)]
pub struct StaffModeEffects;

impl StaffModeEffects {
  fn enter(event: &mut ModeChanged<'_>) {
    let settings = event.settings();
    let member = event.member();
    let subject = event.subject_mut();

    tracing::info!(subject = %member, name = %subject.name(), "enabled staff mode");
    subject.send_message(ENABLED_MESSAGE);

    if let Err(e) = subject.set_vitals(&Vitals::HEALTHY) {
      tracing::warn!(subject = %member, "unable to heal staff member: {e}");
    }
    for effect in subject.potion_effects() {
      subject.remove_potion_effect(&effect.kind);
    }
    subject.set_flight(Flight { allowed: true, flying: true });
    subject.clear_mob_targets();

    if settings.night_vision {
      subject.add_potion_effect(&PotionEffect::night_vision());
    }
    if settings.spectator {
      subject.set_game_mode(GameMode::Spectator);
    }
  }

  fn leave(event: &mut ModeChanged<'_>) {
    let member = event.member();
    let subject = event.subject_mut();

    tracing::info!(subject = %member, name = %subject.name(), "disabled staff mode");
    subject.set_game_mode(GameMode::Survival);
    subject.send_message(DISABLED_MESSAGE);
  }
}

impl Listener for StaffModeEffects {
  fn on_event(&mut self, event: &mut StaffModeEvent<'_>) {
    let StaffModeEvent::ModeChanged(changed) = event else {
      return;
    };
    match changed.mode() {
      Mode::Staff => Self::enter(changed),
      Mode::Survival => Self::leave(changed),
    }
  }
}
