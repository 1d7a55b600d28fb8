//! In-memory fakes for the host-side traits, for this crate's tests and
//! (behind the `testing` feature) for downstream test suites.

use std::{
  collections::{BTreeMap, HashSet},
  path::PathBuf,
  sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use uuid::Uuid;

use crate::{
  Mode,
  document::Document,
  error::BackendError,
  events::{EventBus, StaffModeEvent},
  store::DocumentBackend,
  subject::{
    Capability, Coordinates, Directory, Flight, GameMode, Inventory, LiveSubject, Position,
    PotionEffect, SubjectError, Vitals,
  },
};

// ─── Subjects ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeSubject {
  pub id:             Uuid,
  pub name:           String,
  pub capabilities:   HashSet<Capability>,
  pub vitals:         Vitals,
  pub position:       Position,
  pub inventory:      Inventory,
  pub effects:        Vec<PotionEffect>,
  pub flight:         Flight,
  pub game_mode:      GameMode,
  pub messages:       Vec<String>,
  pub action_bar:     Vec<String>,
  /// Mobs currently targeting this subject.
  pub mob_targets:    usize,
  /// Worlds that refuse teleports.
  pub unloaded:       HashSet<String>,
  /// Makes `set_vitals` fail.
  pub reject_vitals:  bool,
}

impl FakeSubject {
  pub fn new(name: &str) -> Self {
    Self {
      id:            Uuid::new_v4(),
      name:          name.to_owned(),
      capabilities:  HashSet::new(),
      vitals:        Vitals::HEALTHY,
      position:      Position {
        world:       "world".to_owned(),
        coordinates: Coordinates { x: 0.0, y: 64.0, z: 0.0, yaw: 0.0, pitch: 0.0 },
      },
      inventory:     Inventory::empty(),
      effects:       Vec::new(),
      flight:        Flight::default(),
      game_mode:     GameMode::Survival,
      messages:      Vec::new(),
      action_bar:    Vec::new(),
      mob_targets:   0,
      unloaded:      HashSet::new(),
      reject_vitals: false,
    }
  }

  /// A subject holding the staff capability.
  pub fn staff(name: &str) -> Self { Self::new(name).grant(Capability::StaffMember) }

  pub fn grant(mut self, capability: Capability) -> Self {
    self.capabilities.insert(capability);
    self
  }

  pub fn revoke(&mut self, capability: Capability) { self.capabilities.remove(&capability); }
}

impl LiveSubject for FakeSubject {
  fn id(&self) -> Uuid { self.id }

  fn name(&self) -> &str { &self.name }

  fn has_capability(&self, capability: Capability) -> bool {
    self.capabilities.contains(&capability)
  }

  fn vitals(&self) -> Vitals { self.vitals }

  fn set_vitals(&mut self, vitals: &Vitals) -> Result<(), SubjectError> {
    if self.reject_vitals {
      return Err(SubjectError::Rejected("vitals are locked".to_owned()));
    }
    self.vitals = *vitals;
    Ok(())
  }

  fn position(&self) -> Position { self.position.clone() }

  fn teleport(&mut self, position: &Position) -> Result<(), SubjectError> {
    if self.unloaded.contains(&position.world) {
      return Err(SubjectError::WorldNotLoaded(position.world.clone()));
    }
    self.position = position.clone();
    Ok(())
  }

  fn inventory(&self) -> Inventory { self.inventory.clone() }

  fn clear_inventory(&mut self) { self.inventory = Inventory::empty(); }

  fn set_inventory(&mut self, inventory: &Inventory) { self.inventory = inventory.clone(); }

  fn potion_effects(&self) -> Vec<PotionEffect> { self.effects.clone() }

  fn remove_potion_effect(&mut self, kind: &str) { self.effects.retain(|e| e.kind != kind); }

  fn add_potion_effect(&mut self, effect: &PotionEffect) {
    self.remove_potion_effect(&effect.kind);
    self.effects.push(effect.clone());
  }

  fn flight(&self) -> Flight { self.flight }

  fn set_flight(&mut self, flight: Flight) { self.flight = flight; }

  fn game_mode(&self) -> GameMode { self.game_mode }

  fn set_game_mode(&mut self, mode: GameMode) { self.game_mode = mode; }

  fn send_message(&mut self, message: &str) { self.messages.push(message.to_owned()); }

  fn send_action_bar(&mut self, message: &str) { self.action_bar.push(message.to_owned()); }

  fn clear_mob_targets(&mut self) { self.mob_targets = 0; }
}

/// Subjects currently present, keyed by id.
#[derive(Debug, Default)]
pub struct FakeDirectory {
  pub subjects: BTreeMap<Uuid, FakeSubject>,
}

impl FakeDirectory {
  pub fn new() -> Self { Self::default() }

  pub fn connect(&mut self, subject: FakeSubject) -> Uuid {
    let id = subject.id;
    self.subjects.insert(id, subject);
    id
  }

  pub fn disconnect(&mut self, id: Uuid) -> Option<FakeSubject> { self.subjects.remove(&id) }

  /// # Panics
  /// If `id` is not connected.
  pub fn get(&self, id: Uuid) -> &FakeSubject { &self.subjects[&id] }

  /// # Panics
  /// If `id` is not connected.
  pub fn get_mut(&mut self, id: Uuid) -> &mut FakeSubject {
    self.subjects.get_mut(&id).expect("subject is connected")
  }
}

impl Directory for FakeDirectory {
  fn subject(&self, id: Uuid) -> Option<&dyn LiveSubject> {
    self.subjects.get(&id).map(|s| s as &dyn LiveSubject)
  }

  fn subject_mut(&mut self, id: Uuid) -> Option<&mut dyn LiveSubject> {
    self.subjects.get_mut(&id).map(|s| s as &mut dyn LiveSubject)
  }

  fn online(&self) -> Vec<Uuid> { self.subjects.keys().copied().collect() }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
  ToggleRequest { member: Uuid, mode: Mode },
  ModeChanged { member: Uuid, mode: Mode, previous: Option<Mode> },
}

/// Records every published event and optionally cancels toggle requests.
#[derive(Debug, Default)]
pub struct RecordingBus {
  pub events:          Vec<Recorded>,
  pub cancel_requests: bool,
}

impl RecordingBus {
  pub fn new() -> Self { Self::default() }

  pub fn cancelling() -> Self { Self { cancel_requests: true, ..Self::default() } }

  pub fn mode_changes(&self) -> Vec<Recorded> {
    self
      .events
      .iter()
      .copied()
      .filter(|e| matches!(e, Recorded::ModeChanged { .. }))
      .collect()
  }
}

impl EventBus for RecordingBus {
  fn publish(&mut self, event: &mut StaffModeEvent<'_>) {
    match event {
      StaffModeEvent::ToggleRequest(request) => {
        self.events.push(Recorded::ToggleRequest {
          member: request.member(),
          mode:   request.mode(),
        });
        if self.cancel_requests {
          request.set_cancelled(true);
        }
      }
      StaffModeEvent::ModeChanged(changed) => self.events.push(Recorded::ModeChanged {
        member:   changed.member(),
        mode:     changed.mode(),
        previous: changed.previous(),
      }),
    }
  }
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Keeps the persisted document as a JSON string in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
  contents:       Mutex<Option<String>>,
  backups:        Mutex<Vec<String>>,
  writes:         Mutex<usize>,
  pub fail_load:  AtomicBool,
  pub fail_write: AtomicBool,
}

impl MemoryBackend {
  pub fn new() -> Self { Self::default() }

  pub fn with_contents(contents: &str) -> Self {
    let backend = Self::default();
    backend.set_contents(contents);
    backend
  }

  pub fn set_contents(&self, contents: &str) {
    *self.contents.lock().expect("lock") = Some(contents.to_owned());
  }

  pub fn contents(&self) -> Option<String> { self.contents.lock().expect("lock").clone() }

  /// Labels of every backup taken, oldest first.
  pub fn backups(&self) -> Vec<String> { self.backups.lock().expect("lock").clone() }

  pub fn writes(&self) -> usize { *self.writes.lock().expect("lock") }

  pub fn set_fail_load(&self, fail: bool) { self.fail_load.store(fail, Ordering::SeqCst); }

  pub fn set_fail_write(&self, fail: bool) { self.fail_write.store(fail, Ordering::SeqCst); }
}

impl DocumentBackend for MemoryBackend {
  fn load(&self) -> Result<Option<Document>, BackendError> {
    if self.fail_load.load(Ordering::SeqCst) {
      return Err("stored document is corrupt".into());
    }
    let Some(contents) = self.contents() else {
      return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(Some(Document::from_value(value)?))
  }

  fn render(&self, document: &Document) -> Result<String, BackendError> {
    Ok(serde_json::to_string_pretty(&document.to_value())?)
  }

  fn write(&self, rendered: &str) -> Result<(), BackendError> {
    if self.fail_write.load(Ordering::SeqCst) {
      return Err("disk full".into());
    }
    self.set_contents(rendered);
    *self.writes.lock().expect("lock") += 1;
    Ok(())
  }

  fn backup(&self, label: &str) -> Result<Option<PathBuf>, BackendError> {
    if self.contents().is_none() {
      return Ok(None);
    }
    self.backups.lock().expect("lock").push(label.to_owned());
    Ok(Some(PathBuf::from(format!("memory.{label}.bak"))))
  }
}
