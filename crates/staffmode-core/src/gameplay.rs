//! [`GameplaySnapshot`] — everything the registered providers captured for
//! one subject at one moment.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
  document::{get_instant, set_instant},
  registry::SnapshotRegistry,
  snapshot::{ProviderKey, SnapshotContext, SnapshotKind, SnapshotValue},
  subject::{Inventory, Vitals},
};

const UPDATED: &str = "updated";
const SNAPSHOTS: &str = "snapshots";

/// A composite snapshot: at most one value per provider, kept in the order
/// they were captured.
///
/// An empty snapshot is valid and distinct from having no snapshot at all.
#[derive(Debug, Clone, PartialEq)]
pub struct GameplaySnapshot {
  updated: DateTime<Utc>,
  entries: Vec<(ProviderKey, SnapshotValue)>,
}

impl GameplaySnapshot {
  pub fn new(updated: DateTime<Utc>) -> Self {
    Self { updated, entries: Vec::new() }
  }

  /// The baseline applied on first entry into staff mode: healthy vitals, an
  /// empty inventory, and no potion effects. Kinds without a registered
  /// provider are left out.
  pub fn reset(registry: &SnapshotRegistry) -> Self {
    let mut snapshot = Self::new(Utc::now());

    let baseline = [
      SnapshotValue::Stats(Vitals::HEALTHY),
      SnapshotValue::Inventory(Inventory::empty()),
      SnapshotValue::PotionEffects(Vec::new()),
    ];

    for value in baseline {
      if let Some(registration) = registry.lookup_by_kind(&value.kind()) {
        snapshot.insert(registration.key().clone(), value);
      }
    }

    snapshot
  }

  pub fn updated(&self) -> DateTime<Utc> { self.updated }

  /// Insert or replace the entry for `key`. A replaced entry keeps its
  /// original position.
  pub fn insert(&mut self, key: ProviderKey, value: SnapshotValue) {
    match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
      Some((_, slot)) => *slot = value,
      None => self.entries.push((key, value)),
    }
  }

  pub fn get(&self, key: &ProviderKey) -> Option<&SnapshotValue> {
    self
      .entries
      .iter()
      .find(|(existing, _)| existing == key)
      .map(|(_, value)| value)
  }

  pub fn by_kind(&self, kind: &SnapshotKind) -> Option<&SnapshotValue> {
    self
      .entries
      .iter()
      .map(|(_, value)| value)
      .find(|value| value.kind() == *kind)
  }

  pub fn entries(&self) -> impl Iterator<Item = (&ProviderKey, &SnapshotValue)> {
    self.entries.iter().map(|(key, value)| (key, value))
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  // ── Capture / apply ─────────────────────────────────────────────────────

  /// Run every applicable provider in registration order. Providers that
  /// fail are logged and left out of the result.
  pub fn capture(registry: &SnapshotRegistry, context: &SnapshotContext<'_>) -> Self {
    let mut snapshot = Self::new(Utc::now());

    for registration in registry.iter() {
      let provider = registration.provider();
      if !provider.is_applicable(context) {
        continue;
      }

      match provider.capture(context) {
        Ok(value) => snapshot.insert(registration.key().clone(), value),
        Err(e) => tracing::warn!(
          subject = %context.subject().id(),
          provider = %registration.key(),
          mode = %context.mode(),
          "snapshot capture failed: {e}",
        ),
      }
    }

    snapshot
  }

  /// Apply every entry in stored order. A failing entry is logged and does
  /// not prevent the rest from being applied.
  pub fn apply(&self, registry: &SnapshotRegistry, context: &mut SnapshotContext<'_>) {
    for (key, value) in &self.entries {
      let Some(registration) = registry.lookup_by_key(key) else {
        tracing::warn!(provider = %key, "no provider registered; skipping entry");
        continue;
      };

      if let Err(e) = registration.provider().apply(context, value) {
        tracing::warn!(
          subject = %context.subject().id(),
          provider = %key,
          mode = %context.mode(),
          "snapshot apply failed: {e}",
        );
      }
    }
  }

  // ── Document form ───────────────────────────────────────────────────────

  /// Serialise into `{ updated, snapshots: { <provider-key>: ... } }`.
  /// Entries whose provider fails to serialise are logged and omitted.
  pub fn to_document(&self, registry: &SnapshotRegistry) -> Map<String, Value> {
    let mut snapshots = Map::new();

    for (key, value) in &self.entries {
      let Some(registration) = registry.lookup_by_key(key) else {
        continue;
      };

      match registration.provider().serialize(value) {
        Ok(data) => {
          snapshots.insert(key.to_string(), data);
        }
        Err(e) => tracing::warn!(provider = %key, "snapshot serialization failed: {e}"),
      }
    }

    let mut data = Map::new();
    set_instant(&mut data, UPDATED, self.updated);
    data.insert(SNAPSHOTS.to_owned(), Value::Object(snapshots));
    data
  }

  /// Read a snapshot written by [`Self::to_document`].
  ///
  /// Returns `None` when the timestamp or the `snapshots` mapping is missing.
  /// Keys that do not parse, or that name no registered provider, are
  /// skipped; so are entries whose provider rejects the stored data.
  pub fn from_document(registry: &SnapshotRegistry, data: &Map<String, Value>) -> Option<Self> {
    let updated = get_instant(data, UPDATED)?;
    let stored = data.get(SNAPSHOTS)?.as_object()?;

    let mut snapshot = Self::new(updated);

    for (raw_key, entry) in stored {
      let Ok(key) = raw_key.parse::<ProviderKey>() else {
        continue;
      };
      let Some(registration) = registry.lookup_by_key(&key) else {
        continue;
      };

      match registration.provider().deserialize(entry) {
        Ok(Some(value)) => snapshot.insert(key, value),
        Ok(None) => {}
        Err(e) => tracing::warn!(provider = %key, "stored snapshot is unreadable: {e}"),
      }
    }

    Some(snapshot)
  }
}
