//! [`StaffModeManager`] — profile lookup, demotion handling and the session
//! hooks the host calls into.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
  Mode, Result,
  events::EventBus,
  profile::{StaffMember, StaffModeProfile},
  roster::OnlineRoster,
  store::{Concurrency, ProfileStore, SaveOutcome},
  subject::{Capability, Directory, PotionEffect},
};

/// The text shown in the action bar of staff members in staff mode.
pub const STAFF_MODE_REMINDER: &str = "STAFF MODE";

/// How long after a toggle a staff member stays shielded from damage, in
/// whole seconds.
pub const TOGGLE_COOLDOWN: TimeDelta = TimeDelta::seconds(3);

pub struct StaffModeManager<D, E> {
  store:     ProfileStore,
  directory: D,
  events:    E,
  roster:    OnlineRoster,
}

impl<D: Directory, E: EventBus> StaffModeManager<D, E> {
  pub fn new(store: ProfileStore, directory: D, events: E) -> Self {
    Self { store, directory, events, roster: OnlineRoster::new() }
  }

  /// Load persisted profiles. See [`ProfileStore::load_from_disk`].
  pub fn load(&mut self) -> Result<usize> { self.store.load_from_disk() }

  pub fn store(&self) -> &ProfileStore { &self.store }

  pub fn store_mut(&mut self) -> &mut ProfileStore { &mut self.store }

  pub fn directory(&self) -> &D { &self.directory }

  pub fn directory_mut(&mut self) -> &mut D { &mut self.directory }

  pub fn events(&self) -> &E { &self.events }

  pub fn events_mut(&mut self) -> &mut E { &mut self.events }

  pub fn roster(&self) -> &OnlineRoster { &self.roster }

  // ── Lookup ──────────────────────────────────────────────────────────────

  /// The existing profile for `id`, whether or not the subject is online.
  pub fn member(&mut self, id: Uuid) -> Option<StaffModeProfile<'_>> {
    let parts = self.store.parts(id)?;
    Some(StaffModeProfile::new(parts, &mut self.directory, &mut self.events))
  }

  /// The profile of an online subject, created on first use if they hold
  /// the staff capability.
  pub fn online_member(&mut self, id: Uuid) -> Option<StaffModeProfile<'_>> {
    let is_staff = self
      .directory
      .subject(id)?
      .has_capability(Capability::StaffMember);

    if !self.store.contains(id) {
      if !is_staff {
        return None;
      }
      self.store.create(id);
    }

    self.member(id)
  }

  /// Online staff members on the roster that have a profile, in a stable
  /// order.
  pub fn online_members(&mut self) -> Vec<Uuid> {
    let mut ids = self.roster.ids();
    ids.retain(|id| self.store.contains(*id));
    ids
  }

  /// Whether an online staff member is currently in staff mode.
  pub fn is_in_staff_mode(&mut self, id: Uuid) -> bool {
    let is_staff = self
      .directory
      .subject(id)
      .is_some_and(|s| s.has_capability(Capability::StaffMember));

    is_staff && self.online_member(id).is_some_and(|p| p.mode() == Mode::Staff)
  }

  /// Remove a profile from the index and the document.
  pub fn delete_profile(&mut self, id: Uuid) -> bool {
    self.roster.quit(id);
    self.store.delete(id)
  }

  // ── Protection ──────────────────────────────────────────────────────────

  /// Whether `id` toggled less than [`TOGGLE_COOLDOWN`] before `now`.
  /// Elapsed time is truncated to whole seconds.
  pub fn in_toggle_cooldown(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
    self
      .member(id)
      .and_then(|p| p.last_toggled_at())
      .is_some_and(|at| (now - at).num_seconds() < TOGGLE_COOLDOWN.num_seconds())
  }

  /// Whether `id` is shielded from damage: in staff mode, or just toggled.
  pub fn is_protected(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
    self.is_in_staff_mode(id) || self.in_toggle_cooldown(id, now)
  }

  // ── Demotion ────────────────────────────────────────────────────────────

  /// If an online subject has lost the staff capability but still has a
  /// profile, put them back into survival if needed and delete the profile.
  ///
  /// Returns `true` if a profile was deleted.
  pub fn check_for_demotion(&mut self, id: Uuid) -> bool {
    let Some(subject) = self.directory.subject(id) else {
      return false;
    };
    if subject.has_capability(Capability::StaffMember) {
      return false;
    }
    let name = subject.name().to_owned();

    let Some(mut profile) = self.member(id) else {
      return false;
    };

    tracing::info!(subject = %id, name = %name, "deleting demoted staff member's profile");

    if profile.mode() == Mode::Staff {
      tracing::info!(subject = %id, name = %name, "demoted member is in staff mode; restoring survival snapshot");
      profile.force_restore(Mode::Survival);
    }

    self.delete_profile(id)
  }

  // ── Session hooks ───────────────────────────────────────────────────────

  pub fn join(&mut self, id: Uuid) {
    self.check_for_demotion(id);

    let Some(mut profile) = self.online_member(id) else {
      return;
    };
    profile.update_meta_data();
    if profile.mode() == Mode::Staff {
      profile.reapply_mode_effects();
    }

    self.roster.join(id);
  }

  pub fn quit(&mut self, id: Uuid) {
    self.check_for_demotion(id);
    self.roster.quit(id);
  }

  // ── Periodic work ───────────────────────────────────────────────────────

  /// Check every online subject for demotion and refresh night vision for
  /// staff members in staff mode who have it enabled.
  pub fn sweep(&mut self) -> usize {
    let mut demoted = 0;

    for id in self.directory.online() {
      if self.check_for_demotion(id) {
        demoted += 1;
        continue;
      }
      if !self.is_in_staff_mode(id) {
        continue;
      }

      if !self.member(id).is_some_and(|p| p.night_vision()) {
        continue;
      }
      if let Some(subject) = self.directory.subject_mut(id) {
        subject.add_potion_effect(&PotionEffect::night_vision());
      }
    }

    demoted
  }

  pub fn refresh_roster(&mut self) { self.roster.refresh(&self.directory); }

  /// Capture the current mode of every online staff member.
  pub fn capture_online(&mut self) -> usize {
    let mut captured = 0;
    for id in self.roster.ids() {
      if self.online_member(id).and_then(|mut p| p.capture()).is_some() {
        captured += 1;
      }
    }
    captured
  }

  /// Send the staff-mode reminder to online staff members in staff mode.
  pub fn remind(&mut self) {
    for id in self.roster.ids() {
      let in_staff_mode = self.member(id).is_some_and(|p| p.mode() == Mode::Staff);
      if !in_staff_mode {
        continue;
      }
      if let Some(subject) = self.directory.subject_mut(id) {
        subject.send_action_bar(STAFF_MODE_REMINDER);
      }
    }
  }

  pub fn save_if_dirty(&mut self, concurrency: Concurrency) -> Result<SaveOutcome> {
    self.store.save_if_dirty(concurrency)
  }
}
