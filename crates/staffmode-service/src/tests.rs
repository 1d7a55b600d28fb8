//! Tests for configuration, the effects listener, interaction protection and
//! the main loop.

use std::{fs, time::Duration};

use chrono::TimeDelta;
use staffmode_core::{
  Mode,
  events::{EventBus, StaffModeEvent},
  manager::{STAFF_MODE_REMINDER, StaffModeManager},
  profile::{StaffMember, ToggleSwitch},
  subject::{Capability, Flight, GameMode, PotionEffect, Vitals},
  testing::{FakeDirectory, FakeSubject},
};
use tempfile::TempDir;
use tokio::{
  sync::{mpsc, oneshot},
  time,
};

use crate::{
  Command, DeathOutcome, EventDispatcher, Interaction, Listener, ServiceConfig, StaffModeEffects,
  TaskConfig,
  effects::{DISABLED_MESSAGE, ENABLED_MESSAGE},
  interactions::{after_game_mode_change, on_death, should_cancel},
  run,
  runtime::toggle_spectator,
};

type Manager = StaffModeManager<FakeDirectory, EventDispatcher>;

fn fast() -> TaskConfig {
  TaskConfig {
    demotion_sweep_ms: 5,
    roster_refresh_ms: 10,
    capture_every:     1,
    reminder_ms:       5,
  }
}

fn config_in(dir: &TempDir) -> ServiceConfig {
  ServiceConfig {
    data_file: dir.path().join("data").join("survival-staff-mode.data.yml"),
    backups_dir: dir.path().join("backups"),
    tasks: fast(),
    ..ServiceConfig::default()
  }
}

fn manager(config: &ServiceConfig, directory: FakeDirectory) -> Manager {
  let mut manager = StaffModeManager::new(
    config.profile_store().unwrap(),
    directory,
    EventDispatcher::new().with(StaffModeEffects),
  );
  manager.load().unwrap();
  manager
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[test]
fn missing_config_file_uses_defaults() {
  let dir = TempDir::new().unwrap();
  let config = ServiceConfig::load(&dir.path().join("staff-mode.config.yml")).unwrap();

  assert_eq!(config, ServiceConfig::default());
  assert_eq!(config.tasks.roster_refresh(), Duration::from_secs(30));
  assert_eq!(config.tasks.capture_every(), 4);
}

#[test]
fn config_file_overrides_defaults() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("staff-mode.config.yml");
  fs::write(
    &path,
    "data-file: /srv/staff/data.yml\nprovider-namespace: staffplus\ntasks:\n  reminder-ms: 250\n  capture-every: 0\n",
  )
  .unwrap();

  let config = ServiceConfig::load(&path).unwrap();
  assert_eq!(config.data_file, std::path::PathBuf::from("/srv/staff/data.yml"));
  assert_eq!(config.provider_namespace, "staffplus");
  assert_eq!(config.backups_dir, ServiceConfig::default().backups_dir);
  assert_eq!(config.tasks.reminder(), Duration::from_millis(250));
  assert_eq!(config.tasks.demotion_sweep(), Duration::from_secs(1));
  assert_eq!(config.tasks.capture_every(), 1);

  let registry = config.registry().unwrap();
  assert!(registry.iter().all(|r| r.key().namespace() == "staffplus"));
}

// ─── Events ──────────────────────────────────────────────────────────────────

struct Veto;

impl Listener for Veto {
  fn on_event(&mut self, event: &mut StaffModeEvent<'_>) {
    if let StaffModeEvent::ToggleRequest(request) = event {
      request.set_cancelled(true);
    }
  }
}

#[derive(Default)]
struct SeenCancelled(std::rc::Rc<std::cell::Cell<Option<bool>>>);

impl Listener for SeenCancelled {
  fn on_event(&mut self, event: &mut StaffModeEvent<'_>) {
    if matches!(event, StaffModeEvent::ToggleRequest(_)) {
      self.0.set(Some(event.is_cancelled()));
    }
  }
}

#[test]
fn listeners_see_earlier_cancellations() {
  let seen = SeenCancelled::default();
  let observed = std::rc::Rc::clone(&seen.0);
  let mut dispatcher = EventDispatcher::new().with(Veto).with(seen);
  assert_eq!(dispatcher.len(), 2);

  let mut subject = FakeSubject::staff("Alex");
  let id = subject.id;
  let mut event = StaffModeEvent::ToggleRequest(
    staffmode_core::events::ToggleRequest::new(id, Mode::Staff, &mut subject),
  );
  dispatcher.publish(&mut event);

  assert!(event.is_cancelled());
  assert_eq!(observed.get(), Some(true));
}

#[test]
fn vetoed_toggle_fails() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));
  let mut manager = StaffModeManager::new(
    config.profile_store().unwrap(),
    directory,
    EventDispatcher::new().with(Veto).with(StaffModeEffects),
  );

  assert_eq!(manager.online_member(id).unwrap().set_mode(Mode::Staff), ToggleSwitch::Failure);
  assert!(manager.directory().get(id).messages.is_empty());
}

// ─── Effects ─────────────────────────────────────────────────────────────────

#[test]
fn entering_staff_mode_applies_effects() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let mut subject = FakeSubject::staff("Alex");
  subject.vitals.health = 3.0;
  subject.game_mode = GameMode::Survival;
  subject.mob_targets = 2;
  let id = directory.connect(subject);

  let mut manager = manager(&config, directory);
  let mut member = manager.online_member(id).unwrap();
  member.set_night_vision(true);
  member.set_spectator(Some(GameMode::Survival));
  assert_eq!(member.set_mode(Mode::Staff), ToggleSwitch::Success);

  let subject = manager.directory().get(id);
  assert_eq!(subject.vitals, Vitals::HEALTHY);
  assert_eq!(subject.flight, Flight { allowed: true, flying: true });
  assert_eq!(subject.effects, [PotionEffect::night_vision()]);
  assert_eq!(subject.game_mode, GameMode::Spectator);
  assert_eq!(subject.mob_targets, 0);
  assert_eq!(subject.messages, [ENABLED_MESSAGE]);
}

#[test]
fn leaving_staff_mode_returns_to_survival() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));

  let mut manager = manager(&config, directory);
  let mut member = manager.online_member(id).unwrap();
  member.set_spectator(Some(GameMode::Survival));
  member.set_mode(Mode::Staff);
  assert_eq!(member.set_mode(Mode::Survival), ToggleSwitch::Success);

  let subject = manager.directory().get(id);
  assert_eq!(subject.game_mode, GameMode::Survival);
  assert_eq!(subject.flight, Flight::default());
  assert_eq!(subject.messages, [ENABLED_MESSAGE, DISABLED_MESSAGE]);
}

#[test]
fn override_conflict_reapplies_staff_effects() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let mut subject = FakeSubject::staff("Alex").grant(Capability::StaffModeActive);
  subject.flight = Flight::default();
  let id = directory.connect(subject);

  let mut manager = manager(&config, directory);
  assert_eq!(
    manager.online_member(id).unwrap().set_mode(Mode::Survival),
    ToggleSwitch::Failure
  );
  let subject = manager.directory().get(id);
  assert!(subject.flight.flying);
  assert_eq!(subject.messages, [ENABLED_MESSAGE]);
}

#[test]
fn spectator_toggles_while_already_spectating() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let mut subject = FakeSubject::staff("Alex");
  subject.game_mode = GameMode::Spectator;
  let id = directory.connect(subject);

  let mut manager = manager(&config, directory);
  let replies: Vec<_> = (0..3).map(|_| toggle_spectator(&mut manager, id)).collect();
  assert_eq!(replies, [Some(true), Some(false), Some(true)]);

  let member = manager.member(id).unwrap();
  assert!(member.spectator());
  assert_eq!(member.game_mode_prior_to_spectator(), GameMode::Survival);
}

// ─── Interactions ────────────────────────────────────────────────────────────

#[test]
fn staff_mode_cancels_interactions() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let staff = directory.connect(FakeSubject::staff("Alex"));
  let visitor = directory.connect(FakeSubject::new("Visitor"));

  let mut manager = manager(&config, directory);
  manager.online_member(staff).unwrap().set_mode(Mode::Staff);
  let later = chrono::Utc::now() + TimeDelta::minutes(1);

  for interaction in [
    Interaction::Damage,
    Interaction::Hunger,
    Interaction::MobTarget,
    Interaction::Insomnia { previous: 100, next: 101 },
    Interaction::Advancement,
  ] {
    assert!(should_cancel(&mut manager, staff, interaction, later), "{interaction:?}");
    assert!(!should_cancel(&mut manager, visitor, interaction, later), "{interaction:?}");
  }

  let rested = Interaction::Insomnia { previous: 100, next: 0 };
  assert!(!should_cancel(&mut manager, staff, rested, later));
}

#[test]
fn damage_stays_cancelled_for_three_seconds_after_a_toggle() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));

  let mut manager = manager(&config, directory);
  let mut member = manager.online_member(id).unwrap();
  member.set_mode(Mode::Staff);
  member.set_mode(Mode::Survival);
  let toggled = member.last_toggled_at().unwrap();

  let just_before = toggled + TimeDelta::milliseconds(2999);
  let boundary = toggled + TimeDelta::seconds(3);
  assert!(should_cancel(&mut manager, id, Interaction::Damage, just_before));
  assert!(!should_cancel(&mut manager, id, Interaction::Damage, boundary));

  // The cooldown only covers damage.
  assert!(!should_cancel(&mut manager, id, Interaction::Hunger, just_before));
}

#[test]
fn staff_keep_everything_on_death() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));

  let mut manager = manager(&config, directory);
  assert_eq!(on_death(&mut manager, id), None);

  manager.online_member(id).unwrap().set_mode(Mode::Staff);
  let outcome = on_death(&mut manager, id).unwrap();
  assert_eq!(outcome, DeathOutcome::KEEP_EVERYTHING);
  assert!(outcome.keep_inventory && outcome.keep_level);
  assert!(!outcome.drop_items);
  assert_eq!(outcome.dropped_experience, 0);
}

#[test]
fn game_mode_change_restores_flight_in_staff_mode() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));

  let mut manager = manager(&config, directory);
  assert!(!after_game_mode_change(&mut manager, id));

  manager.online_member(id).unwrap().set_mode(Mode::Staff);
  let subject = manager.directory_mut().get_mut(id);
  subject.game_mode = GameMode::Creative;
  subject.flight = Flight::default();

  assert!(after_game_mode_change(&mut manager, id));
  assert_eq!(manager.directory().get(id).flight, Flight { allowed: true, flying: true });
}

// ─── Main loop ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn main_loop_serves_commands_and_flushes_on_shutdown() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));
  let manager = manager(&config, directory);

  let (tx, rx) = mpsc::channel(8);
  let driver = async move {
    tx.send(Command::Join(id)).await.unwrap();

    let (reply, outcome) = oneshot::channel();
    tx.send(Command::Toggle { id, target: None, reply }).await.unwrap();
    assert_eq!(outcome.await.unwrap(), Some(ToggleSwitch::Success));

    let (reply, outcome) = oneshot::channel();
    tx.send(Command::Toggle { id, target: Some(Mode::Staff), reply }).await.unwrap();
    assert_eq!(outcome.await.unwrap(), Some(ToggleSwitch::Already));

    let (reply, outcome) = oneshot::channel();
    tx.send(Command::NightVision { id, reply }).await.unwrap();
    assert_eq!(outcome.await.unwrap(), Some(true));

    let (reply, cancel) = oneshot::channel();
    tx.send(Command::Interaction { id, interaction: Interaction::Hunger, reply }).await.unwrap();
    assert!(cancel.await.unwrap());

    let (reply, outcome) = oneshot::channel();
    tx.send(Command::Death { id, reply }).await.unwrap();
    assert_eq!(outcome.await.unwrap(), Some(DeathOutcome::KEEP_EVERYTHING));

    time::sleep(Duration::from_millis(60)).await;
    tx.send(Command::Shutdown).await.unwrap();
  };

  let (stopped, ()) = tokio::join!(run(manager, config.tasks.clone(), rx), driver);
  let mut manager = stopped.unwrap();

  assert!(!manager.store().is_dirty());
  assert!(config.data_file.exists());

  let subject = manager.directory().get(id);
  assert!(subject.action_bar.iter().any(|m| m == STAFF_MODE_REMINDER));
  assert!(subject.effects.contains(&PotionEffect::night_vision()));

  let member = manager.member(id).unwrap();
  assert_eq!(member.last_toggled_mode(), Some(Mode::Staff));
  assert_eq!(member.name(), Some("Alex"));

  // The flushed file holds the same profile.
  let mut reloaded = StaffModeManager::new(
    config.profile_store().unwrap(),
    FakeDirectory::new(),
    EventDispatcher::new(),
  );
  assert_eq!(reloaded.load().unwrap(), 1);
  assert_eq!(reloaded.member(id).unwrap().mode(), Mode::Staff);
}

#[tokio::test]
async fn main_loop_demotes_revoked_staff() {
  let dir = TempDir::new().unwrap();
  let config = config_in(&dir);
  let mut directory = FakeDirectory::new();
  let id = directory.connect(FakeSubject::staff("Alex"));
  let mut manager = manager(&config, directory);

  manager.join(id);
  manager.online_member(id).unwrap().set_mode(Mode::Staff);
  manager.directory_mut().get_mut(id).revoke(Capability::StaffMember);

  let (tx, rx) = mpsc::channel(1);
  let driver = async move {
    time::sleep(Duration::from_millis(40)).await;
    drop(tx);
  };

  let (stopped, ()) = tokio::join!(run(manager, config.tasks.clone(), rx), driver);
  let mut manager = stopped.unwrap();

  assert!(manager.member(id).is_none());
  assert!(manager.roster().is_empty());
  let subject = manager.directory().get(id);
  assert_eq!(subject.game_mode, GameMode::Survival);
  assert_eq!(subject.messages.last().map(String::as_str), Some(DISABLED_MESSAGE));
}
