//! Subcommand implementations, writing their report to any [`Write`].

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::Value;
use staffmode_core::{
  Mode,
  document::section,
  gameplay::GameplaySnapshot,
  manager::StaffModeManager,
  profile::StaffMember,
  snapshot::ProviderKey,
  store::Concurrency,
  subject::{Directory, LiveSubject},
};
use staffmode_service::{EventDispatcher, ServiceConfig};
use staffmode_store_yaml::YamlFileBackend;
use uuid::Uuid;

/// Nobody is online when working on the data file directly.
pub struct Offline;

impl Directory for Offline {
  fn subject(&self, _: Uuid) -> Option<&dyn LiveSubject> { None }

  fn subject_mut(&mut self, _: Uuid) -> Option<&mut dyn LiveSubject> { None }

  fn online(&self) -> Vec<Uuid> { Vec::new() }
}

/// The loaded data file.
pub struct DataFile {
  manager: StaffModeManager<Offline, EventDispatcher>,
  backend: YamlFileBackend,
  root:    String,
}

impl DataFile {
  fn ids(&self) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = self.manager.store().ids().collect();
    ids.sort();
    ids
  }

  fn profile_data(&self, id: Uuid) -> Option<&serde_json::Map<String, Value>> {
    let id = id.to_string();
    self.manager.store().document().section(&[self.root.as_str(), "profiles", id.as_str()])
  }
}

pub fn open(config: &ServiceConfig) -> Result<DataFile> {
  let mut manager = StaffModeManager::new(config.profile_store()?, Offline, EventDispatcher::new());
  let profiles = manager
    .load()
    .with_context(|| format!("loading {}", config.data_file.display()))?;
  tracing::debug!(profiles, "opened data file");

  Ok(DataFile {
    manager,
    backend: config.backend(),
    root: config.document_root.clone(),
  })
}

fn describe(mode: Option<Mode>) -> &'static str { mode.map_or("-", Mode::name) }

// ─── list ────────────────────────────────────────────────────────────────────

pub fn list(data: &mut DataFile, out: &mut impl Write) -> Result<()> {
  let ids = data.ids();
  if ids.is_empty() {
    writeln!(out, "no profiles")?;
    return Ok(());
  }

  for id in ids {
    let Some(member) = data.manager.member(id) else {
      continue;
    };
    let since = member
      .since_last_toggle()
      .map(|d| format!("{}h ago", d.num_hours()))
      .unwrap_or_else(|| "never toggled".to_owned());
    writeln!(
      out,
      "{id}  {:<16}  {:<8}  {since}",
      member.name().unwrap_or("?"),
      describe(member.last_toggled_mode()),
    )?;
  }
  Ok(())
}

// ─── show ────────────────────────────────────────────────────────────────────

pub fn show(data: &mut DataFile, id: Uuid, out: &mut impl Write) -> Result<()> {
  let Some(mut member) = data.manager.member(id) else {
    bail!("no profile for {id}");
  };

  writeln!(out, "profile:   {id}")?;
  writeln!(out, "name:      {}", member.name().unwrap_or("?"))?;
  writeln!(out, "mode:      {}", describe(member.last_toggled_mode()))?;
  if let Some(at) = member.last_toggled_at() {
    writeln!(out, "toggled:   {} ({}m ago)", at.to_rfc3339(), (Utc::now() - at).num_minutes())?;
  }
  writeln!(out, "settings:  night vision {}, spectator {}", on_off(member.night_vision()), on_off(member.spectator()))?;

  for mode in [Mode::Survival, Mode::Staff] {
    match member.snapshot(mode) {
      Some(snapshot) => {
        let keys: Vec<String> = snapshot.entries().map(|(key, _)| key.to_string()).collect();
        writeln!(
          out,
          "{}: captured {} [{}]",
          mode.name(),
          snapshot.updated().to_rfc3339(),
          keys.join(", "),
        )?;
      }
      None => writeln!(out, "{}: no snapshot", mode.name())?,
    }
  }

  if let Some(raw) = data.profile_data(id) {
    writeln!(out, "---")?;
    write!(out, "{}", serde_yaml::to_string(&Value::Object(raw.clone()))?)?;
  }
  Ok(())
}

fn on_off(enabled: bool) -> &'static str { if enabled { "on" } else { "off" } }

// ─── check ───────────────────────────────────────────────────────────────────

/// Report every stored snapshot entry that would be lost on load. Entries
/// for providers that are not registered are noted but not counted.
pub fn check(data: &DataFile, out: &mut impl Write) -> Result<usize> {
  let mut problems = 0;
  let registry = data.manager.store().registry();

  for id in data.ids() {
    let Some(profile) = data.profile_data(id) else {
      continue;
    };

    if let Some(mode) = section(profile, &["meta"]).and_then(|m| m.get("mode")) {
      let valid = mode.as_str().is_some_and(|m| m.parse::<Mode>().is_ok());
      if !valid {
        writeln!(out, "{id}: unrecognised mode {mode}")?;
        problems += 1;
      }
    }

    for mode in [Mode::Survival, Mode::Staff] {
      let Some(stored) = section(profile, &["modes", mode.name()]) else {
        continue;
      };
      let Some(snapshot) = GameplaySnapshot::from_document(registry, stored) else {
        writeln!(out, "{id} {}: missing timestamp or snapshots", mode.name())?;
        problems += 1;
        continue;
      };

      let entries = stored.get("snapshots").and_then(Value::as_object);
      for raw_key in entries.into_iter().flat_map(|e| e.keys()) {
        let Ok(key) = raw_key.parse::<ProviderKey>() else {
          writeln!(out, "{id} {}: invalid provider key {raw_key:?}", mode.name())?;
          problems += 1;
          continue;
        };
        if registry.lookup_by_key(&key).is_none() {
          writeln!(out, "{id} {}: {key} has no registered provider (ignored)", mode.name())?;
        } else if snapshot.get(&key).is_none() {
          writeln!(out, "{id} {}: {key} is unreadable", mode.name())?;
          problems += 1;
        }
      }
    }
  }

  writeln!(out, "checked {} profile(s), {problems} problem(s)", data.ids().len())?;
  Ok(problems)
}

// ─── remove ──────────────────────────────────────────────────────────────────

pub fn remove(data: &mut DataFile, id: Uuid, out: &mut impl Write) -> Result<()> {
  if !data.manager.store_mut().contains(id) {
    bail!("no profile for {id}");
  }

  if let Some(backup) = data.backend.backup_copy("remove").context("backing up data file")? {
    writeln!(out, "backed up to {}", backup.display())?;
  }

  data.manager.delete_profile(id);
  data.manager.save_if_dirty(Concurrency::Sync).context("saving data file")?;
  writeln!(out, "removed {id}")?;
  Ok(())
}
