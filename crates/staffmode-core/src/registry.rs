//! The ordered registry of snapshot providers.
//!
//! Registrations are additive only. Once a provider is known it stays known
//! for the lifetime of the registry, and iteration always follows
//! registration order so captures are deterministic.

use std::{collections::HashMap, sync::Arc};

use crate::{
  Error, Result,
  providers::{FlightProvider, InventoryProvider, PositionProvider, PotionEffectsProvider, StatsProvider},
  snapshot::{ProviderKey, SnapshotKind, SnapshotProvider},
};

/// A provider bound to its identity and declared value kind.
#[derive(Clone)]
pub struct Registration {
  key:      ProviderKey,
  kind:     SnapshotKind,
  provider: Arc<dyn SnapshotProvider>,
}

impl Registration {
  pub fn key(&self) -> &ProviderKey { &self.key }

  pub fn kind(&self) -> &SnapshotKind { &self.kind }

  pub fn provider(&self) -> &dyn SnapshotProvider { self.provider.as_ref() }

  pub fn shared(&self) -> &Arc<dyn SnapshotProvider> { &self.provider }
}

impl std::fmt::Debug for Registration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registration")
      .field("key", &self.key)
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Default)]
pub struct SnapshotRegistry {
  registrations: Vec<Registration>,
  by_key:        HashMap<ProviderKey, usize>,
  by_kind:       HashMap<SnapshotKind, usize>,
}

impl SnapshotRegistry {
  pub fn new() -> Self { Self::default() }

  /// A registry holding the default providers under `namespace`, in the
  /// order stats, position, inventory, potion-effects, flight.
  pub fn with_defaults(namespace: &str) -> Result<Self> {
    let mut registry = Self::new();
    registry.register(ProviderKey::new(namespace, "stats")?, StatsProvider)?;
    registry.register(ProviderKey::new(namespace, "position")?, PositionProvider)?;
    registry.register(ProviderKey::new(namespace, "inventory")?, InventoryProvider)?;
    registry.register(ProviderKey::new(namespace, "potion-effects")?, PotionEffectsProvider)?;
    registry.register(ProviderKey::new(namespace, "flight")?, FlightProvider)?;
    Ok(registry)
  }

  /// Register `provider` under `key`.
  ///
  /// Fails if the key or the provider's kind is already registered, or if the
  /// kind is the composite [`SnapshotKind::Gameplay`].
  pub fn register<P>(&mut self, key: ProviderKey, provider: P) -> Result<()>
  where
    P: SnapshotProvider + 'static,
  {
    self.register_shared(key, Arc::new(provider))
  }

  pub fn register_shared(
    &mut self,
    key: ProviderKey,
    provider: Arc<dyn SnapshotProvider>,
  ) -> Result<()> {
    let kind = provider.kind();

    if !kind.is_registrable() {
      return Err(Error::NotRegistrable(kind));
    }
    if self.by_key.contains_key(&key) {
      return Err(Error::DuplicateProvider(key));
    }
    if self.by_kind.contains_key(&kind) {
      return Err(Error::DuplicateKind(kind));
    }

    let index = self.registrations.len();
    self.by_key.insert(key.clone(), index);
    self.by_kind.insert(kind.clone(), index);
    self.registrations.push(Registration { key, kind, provider });

    tracing::debug!(provider = %self.registrations[index].key, "registered snapshot provider");
    Ok(())
  }

  pub fn lookup_by_key(&self, key: &ProviderKey) -> Option<&Registration> {
    self.by_key.get(key).map(|&i| &self.registrations[i])
  }

  pub fn lookup_by_kind(&self, kind: &SnapshotKind) -> Option<&Registration> {
    self.by_kind.get(kind).map(|&i| &self.registrations[i])
  }

  /// All registrations in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &Registration> { self.registrations.iter() }

  pub fn len(&self) -> usize { self.registrations.len() }

  pub fn is_empty(&self) -> bool { self.registrations.is_empty() }
}
