//! Snapshot values, provider identities, and the provider contract.
//!
//! A provider captures one facet of a live subject into a [`SnapshotValue`],
//! serialises it for the persisted document, and re-applies it later. The
//! provider's [`ProviderKey`] is the on-disk discriminator that routes stored
//! data back to the provider that understands it.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{
  Error, Mode,
  subject::{Flight, Inventory, LiveSubject, Position, PotionEffect, SubjectError, Vitals},
};

// ─── Provider identity ───────────────────────────────────────────────────────

/// A namespaced provider identity, written as `namespace:key`.
///
/// Namespaces match `[a-z0-9._-]+`; keys additionally allow `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderKey {
  namespace: String,
  key:       String,
}

impl ProviderKey {
  pub fn new(namespace: &str, key: &str) -> crate::Result<Self> {
    let valid_namespace = !namespace.is_empty()
      && namespace.chars().all(|c| is_key_char(c) && c != '/');
    let valid_key = !key.is_empty() && key.chars().all(is_key_char);

    if !valid_namespace || !valid_key {
      return Err(Error::InvalidProviderKey(format!("{namespace}:{key}")));
    }

    Ok(Self { namespace: namespace.to_owned(), key: key.to_owned() })
  }

  pub fn namespace(&self) -> &str { &self.namespace }

  pub fn key(&self) -> &str { &self.key }
}

fn is_key_char(c: char) -> bool {
  matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-' | '/')
}

impl fmt::Display for ProviderKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.namespace, self.key)
  }
}

impl FromStr for ProviderKey {
  type Err = Error;

  fn from_str(s: &str) -> crate::Result<Self> {
    match s.split_once(':') {
      Some((namespace, key)) => Self::new(namespace, key),
      None => Err(Error::InvalidProviderKey(s.to_owned())),
    }
  }
}

// ─── Value kinds ─────────────────────────────────────────────────────────────

/// The declared type of value a provider produces.
///
/// Each kind maps to at most one registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
  Stats,
  Position,
  Inventory,
  PotionEffects,
  Flight,
  /// The composite [`GameplaySnapshot`](crate::gameplay::GameplaySnapshot).
  /// Never registrable, so composites cannot nest.
  Gameplay,
  /// A value type contributed by an external provider.
  Custom(String),
}

impl SnapshotKind {
  pub fn is_registrable(&self) -> bool { !matches!(self, Self::Gameplay) }
}

impl fmt::Display for SnapshotKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Stats => f.write_str("stats"),
      Self::Position => f.write_str("position"),
      Self::Inventory => f.write_str("inventory"),
      Self::PotionEffects => f.write_str("potion-effects"),
      Self::Flight => f.write_str("flight"),
      Self::Gameplay => f.write_str("gameplay"),
      Self::Custom(name) => write!(f, "custom({name})"),
    }
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A captured facet of a subject's state.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
  Stats(Vitals),
  Position(Position),
  Inventory(Inventory),
  PotionEffects(Vec<PotionEffect>),
  Flight(Flight),
  /// Escape hatch for external providers; `kind` names their
  /// [`SnapshotKind::Custom`].
  Custom {
    kind: String,
    data: serde_json::Value,
  },
}

impl SnapshotValue {
  pub fn kind(&self) -> SnapshotKind {
    match self {
      Self::Stats(_) => SnapshotKind::Stats,
      Self::Position(_) => SnapshotKind::Position,
      Self::Inventory(_) => SnapshotKind::Inventory,
      Self::PotionEffects(_) => SnapshotKind::PotionEffects,
      Self::Flight(_) => SnapshotKind::Flight,
      Self::Custom { kind, .. } => SnapshotKind::Custom(kind.clone()),
    }
  }
}

// ─── Provider contract ───────────────────────────────────────────────────────

/// Failures raised by a single provider. The orchestrating layer logs them and
/// moves on to the next provider.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("expected a {expected} value but received {found}")]
  KindMismatch {
    expected: SnapshotKind,
    found:    SnapshotKind,
  },

  #[error("malformed snapshot data: {0}")]
  Malformed(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error(transparent)]
  Subject(#[from] SubjectError),
}

impl SnapshotError {
  pub fn mismatch(expected: SnapshotKind, value: &SnapshotValue) -> Self {
    Self::KindMismatch { expected, found: value.kind() }
  }
}

/// The subject being captured or restored and the mode it is captured for or
/// restored into.
pub struct SnapshotContext<'a> {
  subject: &'a mut dyn LiveSubject,
  mode:    Mode,
}

impl<'a> SnapshotContext<'a> {
  pub fn new(subject: &'a mut dyn LiveSubject, mode: Mode) -> Self {
    Self { subject, mode }
  }

  pub fn subject(&self) -> &dyn LiveSubject { &*self.subject }

  pub fn subject_mut(&mut self) -> &mut dyn LiveSubject { &mut *self.subject }

  pub fn mode(&self) -> Mode { self.mode }
}

/// Captures and restores one facet of a subject's state.
///
/// `capture` must only read. `apply` must fully overwrite the facet it owns,
/// never merge with what is already there.
pub trait SnapshotProvider: Send + Sync {
  /// The kind of value this provider produces and accepts.
  fn kind(&self) -> SnapshotKind;

  fn is_applicable(&self, context: &SnapshotContext<'_>) -> bool {
    let _ = context;
    true
  }

  fn capture(
    &self,
    context: &SnapshotContext<'_>,
  ) -> Result<SnapshotValue, SnapshotError>;

  fn serialize(
    &self,
    value: &SnapshotValue,
  ) -> Result<serde_json::Value, SnapshotError>;

  /// `Ok(None)` means the stored data is recognisably incomplete and should
  /// be ignored.
  fn deserialize(
    &self,
    data: &serde_json::Value,
  ) -> Result<Option<SnapshotValue>, SnapshotError>;

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError>;
}
