//! [`ProfileStore`] — the per-subject profile index and the persisted
//! document behind it.
//!
//! Every mutation that must reach disk records a [`FlushIntent`]. Saving
//! renders the whole document on the calling thread and hands the rendered
//! string to the backend, either inline or on a blocking worker; the intent
//! is only cleared once the backend confirms the write.

use std::{
  collections::HashMap,
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
  Error, Result,
  document::Document,
  error::BackendError,
  profile::ProfileCache,
  registry::SnapshotRegistry,
};

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Reads, renders and writes the persisted document.
pub trait DocumentBackend: Send + Sync + 'static {
  /// Parse the persisted document. `Ok(None)` means nothing has been written
  /// yet; `Err` means the stored data exists but is unusable.
  fn load(&self) -> Result<Option<Document>, BackendError>;

  fn render(&self, document: &Document) -> Result<String, BackendError>;

  /// Replace the persisted document with `rendered`.
  fn write(&self, rendered: &str) -> Result<(), BackendError>;

  /// Copy the current persisted document aside, labelled with `label` and a
  /// timestamp. Returns the backup's location, or `None` if there was nothing
  /// to copy.
  fn backup(&self, label: &str) -> Result<Option<PathBuf>, BackendError>;
}

// ─── Flush intent ────────────────────────────────────────────────────────────

/// Tracks whether in-memory state has diverged from the last confirmed write.
///
/// Mutations bump a generation; a save carries the generation it rendered and
/// confirms it once written. Mutations made while a write is in flight stay
/// pending.
#[derive(Debug, Default)]
pub struct FlushIntent {
  pending:   u64,
  confirmed: Arc<AtomicU64>,
}

impl FlushIntent {
  pub fn record(&mut self) { self.pending += 1; }

  pub fn is_dirty(&self) -> bool {
    self.pending > self.confirmed.load(Ordering::Acquire)
  }

  fn ticket(&self) -> FlushTicket {
    FlushTicket {
      generation: self.pending,
      confirmed:  Arc::clone(&self.confirmed),
    }
  }
}

struct FlushTicket {
  generation: u64,
  confirmed:  Arc<AtomicU64>,
}

impl FlushTicket {
  fn confirm(self) {
    self.confirmed.fetch_max(self.generation, Ordering::AcqRel);
  }
}

/// How [`ProfileStore::save_if_dirty`] performs the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
  /// Block the caller until the write completes (used at shutdown).
  Sync,
  /// Write on a blocking worker and return immediately.
  Async,
}

#[derive(Debug)]
pub enum SaveOutcome {
  /// Nothing to write.
  Clean,
  Written,
  /// Handed to a worker; resolves to `true` once the write is confirmed.
  Scheduled(JoinHandle<bool>),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Borrowed pieces of one profile, handed to
/// [`StaffModeProfile`](crate::profile::StaffModeProfile).
pub struct ProfileParts<'a> {
  pub id:       Uuid,
  pub cache:    &'a mut ProfileCache,
  pub data:     &'a mut Map<String, Value>,
  pub registry: &'a SnapshotRegistry,
  pub intent:   &'a mut FlushIntent,
}

pub struct ProfileStore {
  backend:  Arc<dyn DocumentBackend>,
  registry: SnapshotRegistry,
  document: Document,
  root:     Vec<String>,
  profiles: HashMap<Uuid, ProfileCache>,
  intent:   FlushIntent,
}

impl ProfileStore {
  /// A store whose profiles live under `<document_root>.profiles`.
  pub fn new(
    backend: Arc<dyn DocumentBackend>,
    registry: SnapshotRegistry,
    document_root: &str,
  ) -> Self {
    Self {
      backend,
      registry,
      document: Document::new(),
      root: vec![document_root.to_owned(), "profiles".to_owned()],
      profiles: HashMap::new(),
      intent: FlushIntent::default(),
    }
  }

  pub fn registry(&self) -> &SnapshotRegistry { &self.registry }

  /// External providers are registered here before profiles are used.
  pub fn registry_mut(&mut self) -> &mut SnapshotRegistry { &mut self.registry }

  pub fn document(&self) -> &Document { &self.document }

  pub fn is_dirty(&self) -> bool { self.intent.is_dirty() }

  fn root_path(&self) -> Vec<&str> { self.root.iter().map(String::as_str).collect() }

  fn profiles_section(&self) -> Option<&Map<String, Value>> {
    self.document.section(&self.root_path())
  }

  // ── Loading ─────────────────────────────────────────────────────────────

  /// Replace the in-memory document with the persisted one and rebuild the
  /// profile index from its keys.
  ///
  /// If the persisted data is unusable, a timestamped backup is written and
  /// the load is abandoned, leaving the current in-memory state untouched.
  pub fn load_from_disk(&mut self) -> Result<usize> {
    let document = match self.backend.load() {
      Ok(Some(document)) => document,
      Ok(None) => {
        tracing::info!("no profile data yet; starting empty");
        Document::new()
      }
      Err(e) => {
        tracing::error!("unable to load profile data: {e}");
        tracing::error!("saving data backup just in case...");
        match self.backend.backup("error") {
          Ok(Some(path)) => tracing::error!(backup = %path.display(), "backed up unreadable profile data"),
          Ok(None) => {}
          Err(backup_err) => tracing::error!("backup failed: {backup_err}"),
        }
        return Err(Error::Backend(e));
      }
    };

    self.document = document;
    self.profiles.clear();

    let keys: Vec<String> = self
      .profiles_section()
      .map(|section| section.keys().cloned().collect())
      .unwrap_or_default();

    for key in keys {
      match Uuid::parse_str(&key) {
        Ok(id) => {
          self.profiles.insert(id, ProfileCache::default());
        }
        Err(_) => tracing::warn!(key = %key, "ignoring profile with an invalid subject id"),
      }
    }

    tracing::info!(profiles = self.profiles.len(), "loaded profile data");
    Ok(self.profiles.len())
  }

  // ── Index ───────────────────────────────────────────────────────────────

  pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ { self.profiles.keys().copied() }

  pub fn len(&self) -> usize { self.profiles.len() }

  pub fn is_empty(&self) -> bool { self.profiles.is_empty() }

  /// Whether `id` has a profile, indexing it from the document if needed.
  pub fn contains(&mut self, id: Uuid) -> bool {
    if self.profiles.contains_key(&id) {
      return true;
    }

    let key = id.to_string();
    let stored = self.profiles_section().is_some_and(|s| s.get(&key).is_some_and(Value::is_object));
    if stored {
      self.profiles.insert(id, ProfileCache::default());
    }
    stored
  }

  /// Create an empty profile for `id` unless one already exists.
  pub fn create(&mut self, id: Uuid) {
    if self.contains(id) {
      return;
    }

    let key = id.to_string();
    let mut path: Vec<&str> = self.root.iter().map(String::as_str).collect();
    path.push(&key);
    self.document.section_mut(&path);

    self.profiles.insert(id, ProfileCache::default());
    self.intent.record();
    tracing::debug!(subject = %id, "created staff mode profile");
  }

  /// Remove `id` from both the index and the document.
  pub fn delete(&mut self, id: Uuid) -> bool {
    let indexed = self.profiles.remove(&id).is_some();

    let key = id.to_string();
    let mut path: Vec<&str> = self.root.iter().map(String::as_str).collect();
    path.push(&key);
    let stored = self.document.remove(&path).is_some();

    if indexed || stored {
      self.intent.record();
    }
    indexed || stored
  }

  pub fn parts(&mut self, id: Uuid) -> Option<ProfileParts<'_>> {
    if !self.contains(id) {
      return None;
    }

    let key = id.to_string();
    let mut path: Vec<&str> = self.root.iter().map(String::as_str).collect();
    path.push(&key);

    let cache = self.profiles.get_mut(&id)?;
    let data = self.document.section_mut(&path);

    Some(ProfileParts {
      id,
      cache,
      data,
      registry: &self.registry,
      intent: &mut self.intent,
    })
  }

  // ── Saving ──────────────────────────────────────────────────────────────

  /// Write the document if anything changed since the last confirmed write.
  ///
  /// A failed write leaves the store dirty so a later save retries.
  pub fn save_if_dirty(&mut self, concurrency: Concurrency) -> Result<SaveOutcome> {
    if !self.intent.is_dirty() {
      return Ok(SaveOutcome::Clean);
    }

    let rendered = self.backend.render(&self.document).map_err(Error::Backend)?;
    let ticket = self.intent.ticket();
    let backend = Arc::clone(&self.backend);

    let handle = match concurrency {
      Concurrency::Async => tokio::runtime::Handle::try_current().ok(),
      Concurrency::Sync => None,
    };

    let Some(handle) = handle else {
      if concurrency == Concurrency::Async {
        tracing::warn!("no async runtime available; saving profile data synchronously");
      }
      backend.write(&rendered).map_err(Error::Backend)?;
      ticket.confirm();
      tracing::debug!("saved profile data");
      return Ok(SaveOutcome::Written);
    };

    let task = handle.spawn_blocking(move || match backend.write(&rendered) {
      Ok(()) => {
        ticket.confirm();
        tracing::debug!("saved profile data");
        true
      }
      Err(e) => {
        tracing::error!("unable to save profile data: {e}");
        false
      }
    });

    Ok(SaveOutcome::Scheduled(task))
  }
}
