//! The per-subject profile and the mode-toggle protocol.
//!
//! Profile data lives in the store's document under the subject's id:
//!
//! ```yaml
//! meta:
//!   name: Steve
//!   mode: STAFF
//!   timestamp: 2024-05-01T12:00:00Z
//!   settings: { night-vision: <instant>, spectator: SURVIVAL }
//! modes:
//!   SURVIVAL: { updated: <instant>, snapshots: { ... } }
//!   STAFF:    { updated: <instant>, snapshots: { ... } }
//! ```
//!
//! Decoded snapshots are cached per mode. A cache miss reads the document,
//! and every write goes to both.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  Mode,
  document::{get_instant, section, section_mut, set_instant},
  events::{EventBus, ModeChanged, StaffModeEvent, ToggleRequest},
  gameplay::GameplaySnapshot,
  registry::SnapshotRegistry,
  snapshot::SnapshotContext,
  store::{FlushIntent, ProfileParts},
  subject::{Capability, Directory, GameMode, LiveSubject},
};

const META: &str = "meta";
const MODES: &str = "modes";
const NAME: &str = "name";
const MODE: &str = "mode";
const TIMESTAMP: &str = "timestamp";
const SETTINGS: &str = "settings";
const NIGHT_VISION: &str = "night-vision";
const SPECTATOR: &str = "spectator";

/// The result of [`StaffMember::set_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSwitch {
  Success,
  /// The subject was already in the requested mode; nothing happened.
  Already,
  /// The subject is not present, the request was cancelled, or an
  /// administrative override keeps them in staff mode.
  Failure,
}

/// Decoded snapshots for one profile, by mode.
#[derive(Debug, Default)]
pub struct ProfileCache {
  snapshots: HashMap<Mode, GameplaySnapshot>,
}

/// Per-profile preferences carried into [`ModeChanged`] notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileSettings {
  pub night_vision: bool,
  pub spectator:    bool,
}

/// The operations exposed to collaborators for one staff member.
pub trait StaffMember {
  fn id(&self) -> Uuid;

  /// The mode recorded by the most recent successful toggle.
  fn last_toggled_mode(&self) -> Option<Mode>;

  fn last_toggled_at(&self) -> Option<DateTime<Utc>>;

  fn since_last_toggle(&self) -> Option<TimeDelta> {
    self.last_toggled_at().map(|at| Utc::now() - at)
  }

  /// The mode in force right now, accounting for the administrative
  /// override.
  fn mode(&self) -> Mode;

  fn set_mode(&mut self, mode: Mode) -> ToggleSwitch;

  /// Capture and persist the current mode's state. `None` if the subject is
  /// not present.
  fn capture(&mut self) -> Option<GameplaySnapshot>;

  /// The stored snapshot for `mode`, if one was ever captured.
  fn snapshot(&mut self, mode: Mode) -> Option<GameplaySnapshot>;
}

// ─── Document helpers ────────────────────────────────────────────────────────

fn meta(data: &Map<String, Value>) -> Option<&Map<String, Value>> { section(data, &[META]) }

fn settings_section(data: &Map<String, Value>) -> Option<&Map<String, Value>> {
  section(data, &[META, SETTINGS])
}

fn recorded_mode(data: &Map<String, Value>) -> Option<Mode> {
  meta(data)?
    .get(MODE)?
    .as_str()
    .and_then(|name| Mode::from_str(name).ok())
}

fn effective_mode(subject: &dyn LiveSubject, data: &Map<String, Value>) -> Mode {
  if subject.has_capability(Capability::StaffModeActive) {
    Mode::Staff
  } else {
    recorded_mode(data).unwrap_or(Mode::Survival)
  }
}

fn read_settings(data: &Map<String, Value>) -> ProfileSettings {
  let settings = settings_section(data);
  ProfileSettings {
    night_vision: settings.is_some_and(|s| s.contains_key(NIGHT_VISION)),
    spectator:    settings.is_some_and(|s| s.contains_key(SPECTATOR)),
  }
}

fn assert_owner(id: Uuid, subject: &dyn LiveSubject) {
  assert_eq!(
    id,
    subject.id(),
    "expected subject {id} but received {} ({})",
    subject.id(),
    subject.name(),
  );
}

fn load_snapshot(
  data: &Map<String, Value>,
  cache: &mut ProfileCache,
  registry: &SnapshotRegistry,
  mode: Mode,
) -> Option<GameplaySnapshot> {
  if let Some(cached) = cache.snapshots.get(&mode) {
    return Some(cached.clone());
  }

  let stored = section(data, &[MODES, mode.name()])?;
  let snapshot = GameplaySnapshot::from_document(registry, stored)?;
  cache.snapshots.insert(mode, snapshot.clone());
  Some(snapshot)
}

/// Replace (never merge) the stored snapshot for `mode`.
fn store_snapshot(
  data: &mut Map<String, Value>,
  cache: &mut ProfileCache,
  intent: &mut FlushIntent,
  registry: &SnapshotRegistry,
  mode: Mode,
  snapshot: GameplaySnapshot,
) {
  let modes = section_mut(data, &[MODES]);
  modes.shift_remove(mode.name());
  modes.insert(mode.name().to_owned(), Value::Object(snapshot.to_document(registry)));
  intent.record();
  cache.snapshots.insert(mode, snapshot);
}

// ─── Profile handle ──────────────────────────────────────────────────────────

/// A borrowed view of one subject's profile together with the collaborators
/// a toggle needs.
pub struct StaffModeProfile<'a> {
  id:        Uuid,
  cache:     &'a mut ProfileCache,
  data:      &'a mut Map<String, Value>,
  registry:  &'a SnapshotRegistry,
  intent:    &'a mut FlushIntent,
  directory: &'a mut dyn Directory,
  events:    &'a mut dyn EventBus,
}

impl<'a> StaffModeProfile<'a> {
  pub fn new(
    parts: ProfileParts<'a>,
    directory: &'a mut dyn Directory,
    events: &'a mut dyn EventBus,
  ) -> Self {
    let ProfileParts { id, cache, data, registry, intent } = parts;
    Self { id, cache, data, registry, intent, directory, events }
  }

  pub fn is_online(&self) -> bool { self.directory.subject(self.id).is_some() }

  pub fn name(&self) -> Option<&str> { meta(self.data)?.get(NAME)?.as_str() }

  /// Record the subject's current display name.
  pub fn update_meta_data(&mut self) {
    let Some(subject) = self.directory.subject(self.id) else {
      return;
    };
    assert_owner(self.id, subject);

    let name = Value::String(subject.name().to_owned());
    let meta = section_mut(self.data, &[META]);
    if meta.get(NAME) != Some(&name) {
      meta.insert(NAME.to_owned(), name);
      self.intent.record();
    }
  }

  // ── Settings ────────────────────────────────────────────────────────────

  pub fn settings(&self) -> ProfileSettings { read_settings(self.data) }

  pub fn night_vision(&self) -> bool { self.settings().night_vision }

  pub fn set_night_vision(&mut self, enabled: bool) {
    let settings = section_mut(self.data, &[META, SETTINGS]);
    if enabled {
      set_instant(settings, NIGHT_VISION, Utc::now());
    } else {
      settings.shift_remove(NIGHT_VISION);
    }
    self.intent.record();
  }

  pub fn spectator(&self) -> bool { self.settings().spectator }

  /// Enable spectator mode, remembering the game mode to return to, or
  /// disable it with `None`. A prior mode of spectator itself is not
  /// remembered and leaves the setting disabled.
  ///
  /// Returns whether the setting is enabled afterwards.
  pub fn set_spectator(&mut self, prior: Option<GameMode>) -> bool {
    let settings = section_mut(self.data, &[META, SETTINGS]);
    let enabled = match prior.filter(|mode| *mode != GameMode::Spectator) {
      Some(mode) => {
        settings.insert(SPECTATOR.to_owned(), Value::String(mode.to_string()));
        true
      }
      None => {
        settings.shift_remove(SPECTATOR);
        false
      }
    };
    self.intent.record();
    enabled
  }

  pub fn game_mode_prior_to_spectator(&self) -> GameMode {
    settings_section(self.data)
      .and_then(|s| s.get(SPECTATOR))
      .and_then(Value::as_str)
      .and_then(|name| GameMode::from_str(name).ok())
      .filter(|mode| *mode != GameMode::Spectator)
      .unwrap_or(GameMode::Survival)
  }

  // ── Capture / restore ───────────────────────────────────────────────────

  /// Capture `mode`'s state from the live subject and store it, replacing
  /// whatever was stored for that mode before.
  pub fn force_capture(&mut self, mode: Mode) -> Option<GameplaySnapshot> {
    let subject = self.directory.subject_mut(self.id)?;
    assert_owner(self.id, &*subject);

    let captured = GameplaySnapshot::capture(self.registry, &SnapshotContext::new(subject, mode));
    store_snapshot(self.data, self.cache, self.intent, self.registry, mode, captured.clone());

    tracing::debug!(subject = %self.id, mode = %mode, entries = captured.len(), "captured snapshot");
    Some(captured)
  }

  /// Apply `mode`'s stored snapshot without capturing anything first, then
  /// raise [`ModeChanged`]. Used for administrative corrections.
  ///
  /// Returns `false` if the subject is not present.
  pub fn force_restore(&mut self, mode: Mode) -> bool {
    let previous = self.directory.subject(self.id).map(|s| effective_mode(s, self.data));
    let settings = read_settings(self.data);
    let stored = load_snapshot(self.data, self.cache, self.registry, mode);

    let Some(subject) = self.directory.subject_mut(self.id) else {
      return false;
    };
    assert_owner(self.id, &*subject);

    apply_restored(self.registry, &mut *subject, mode, stored.as_ref());

    let mut event = StaffModeEvent::ModeChanged(ModeChanged::new(
      self.id, mode, previous, subject, settings,
    ));
    self.events.publish(&mut event);
    true
  }

  /// Re-raise [`ModeChanged`] for the current effective mode without
  /// touching any snapshot, so ancillary effects are applied again.
  pub fn reapply_mode_effects(&mut self) -> bool {
    let settings = read_settings(self.data);
    let Some(subject) = self.directory.subject_mut(self.id) else {
      return false;
    };
    assert_owner(self.id, &*subject);

    let mode = effective_mode(&*subject, self.data);
    let mut event = StaffModeEvent::ModeChanged(ModeChanged::new(self.id, mode, None, subject, settings));
    self.events.publish(&mut event);
    true
  }
}

/// Apply a stored snapshot, or the reset baseline on first entry into staff
/// mode. First entry into survival leaves the subject as they are.
fn apply_restored(
  registry: &SnapshotRegistry,
  subject: &mut dyn LiveSubject,
  mode: Mode,
  stored: Option<&GameplaySnapshot>,
) {
  let mut context = SnapshotContext::new(subject, mode);
  match stored {
    Some(snapshot) => snapshot.apply(registry, &mut context),
    None if mode == Mode::Staff => GameplaySnapshot::reset(registry).apply(registry, &mut context),
    None => {}
  }
}

impl StaffMember for StaffModeProfile<'_> {
  fn id(&self) -> Uuid { self.id }

  fn last_toggled_mode(&self) -> Option<Mode> { recorded_mode(self.data) }

  fn last_toggled_at(&self) -> Option<DateTime<Utc>> {
    meta(self.data).and_then(|m| get_instant(m, TIMESTAMP))
  }

  /// Without a live subject the recorded mode is reported.
  fn mode(&self) -> Mode {
    match self.directory.subject(self.id) {
      Some(subject) => {
        assert_owner(self.id, subject);
        effective_mode(subject, self.data)
      }
      None => recorded_mode(self.data).unwrap_or(Mode::Survival),
    }
  }

  fn set_mode(&mut self, target: Mode) -> ToggleSwitch {
    let id = self.id;

    let current = self.mode();
    if target == current {
      return ToggleSwitch::Already;
    }

    let Some(subject) = self.directory.subject_mut(id) else {
      return ToggleSwitch::Failure;
    };

    let settings = read_settings(self.data);

    // The override can't be bypassed: put staff mode's effects back and
    // refuse.
    if subject.has_capability(Capability::StaffModeActive) {
      tracing::warn!(
        subject = %id,
        "cannot leave staff mode while {} is granted",
        Capability::StaffModeActive.node(),
      );
      let mut event = StaffModeEvent::ModeChanged(ModeChanged::new(
        id, Mode::Staff, None, subject, settings,
      ));
      self.events.publish(&mut event);
      return ToggleSwitch::Failure;
    }

    let mut request = StaffModeEvent::ToggleRequest(ToggleRequest::new(id, target, &mut *subject));
    self.events.publish(&mut request);
    if request.is_cancelled() {
      tracing::debug!(subject = %id, mode = %target, "toggle request cancelled");
      return ToggleSwitch::Failure;
    }
    drop(request);

    // Capture and save the current mode's state.
    let captured = GameplaySnapshot::capture(self.registry, &SnapshotContext::new(&mut *subject, current));
    store_snapshot(self.data, self.cache, self.intent, self.registry, current, captured);

    // Record the toggle.
    let meta = section_mut(self.data, &[META]);
    meta.insert(MODE.to_owned(), Value::String(target.name().to_owned()));
    set_instant(meta, TIMESTAMP, Utc::now());
    self.intent.record();

    // Restore the target mode's state.
    let stored = load_snapshot(self.data, self.cache, self.registry, target);
    apply_restored(self.registry, &mut *subject, target, stored.as_ref());

    tracing::info!(subject = %id, name = %subject.name(), from = %current, to = %target, "toggled staff mode");

    let mut event = StaffModeEvent::ModeChanged(ModeChanged::new(
      id,
      target,
      Some(current),
      subject,
      settings,
    ));
    self.events.publish(&mut event);
    ToggleSwitch::Success
  }

  fn capture(&mut self) -> Option<GameplaySnapshot> {
    let subject = self.directory.subject(self.id)?;
    let mode = effective_mode(subject, self.data);
    self.force_capture(mode)
  }

  fn snapshot(&mut self, mode: Mode) -> Option<GameplaySnapshot> {
    load_snapshot(self.data, self.cache, self.registry, mode)
  }
}
