//! Tests for `YamlFileBackend` against a temporary directory.

use std::{fs, sync::Arc};

use serde_json::json;
use staffmode_core::{
  Mode,
  document::Document,
  manager::StaffModeManager,
  profile::{StaffMember, ToggleSwitch},
  registry::SnapshotRegistry,
  store::{Concurrency, DocumentBackend, ProfileStore, SaveOutcome},
  testing::{FakeDirectory, FakeSubject, RecordingBus},
};
use tempfile::TempDir;

use crate::{Error, YamlFileBackend, store::parse};

fn backend(dir: &TempDir) -> YamlFileBackend {
  YamlFileBackend::new(
    dir.path().join("data").join("survival-staff-mode.data.yml"),
    dir.path().join("backups"),
  )
}

// ─── Reading ─────────────────────────────────────────────────────────────────

#[test]
fn missing_file_is_none() {
  let dir = TempDir::new().unwrap();
  assert!(backend(&dir).read().unwrap().is_none());
}

#[test]
fn empty_file_is_an_empty_document() {
  let dir = TempDir::new().unwrap();
  let backend = backend(&dir);
  backend.write_str("").unwrap();

  assert_eq!(backend.read().unwrap(), Some(Document::new()));
}

#[test]
fn nested_keys_parse_as_sections() {
  let document = parse(
    r#"
survival-staff-mode:
  profiles:
    0b6a1f0e-8d4e-4a53-9f57-3f0a8e4f6c11:
      meta:
        name: Alex
        mode: STAFF
        timestamp: "2024-05-01T12:00:00Z"
"#,
  )
  .unwrap();

  let meta = document
    .section(&["survival-staff-mode", "profiles", "0b6a1f0e-8d4e-4a53-9f57-3f0a8e4f6c11", "meta"])
    .unwrap();
  assert_eq!(meta["mode"], "STAFF");
  assert_eq!(meta["name"], "Alex");
}

#[test]
fn non_mapping_root_is_rejected() {
  assert!(matches!(
    parse("- just\n- a list\n"),
    Err(Error::Core(staffmode_core::Error::NotAMapping))
  ));
}

#[test]
fn broken_yaml_is_an_error() {
  assert!(matches!(parse("profiles: [unclosed"), Err(Error::Yaml(_))));
}

// ─── Writing ─────────────────────────────────────────────────────────────────

#[test]
fn write_creates_parent_directories_and_round_trips() {
  let dir = TempDir::new().unwrap();
  let backend = backend(&dir);

  let document =
    Document::from_value(json!({ "survival-staff-mode": { "profiles": { "a": { "meta": { "mode": "SURVIVAL" } } } } }))
      .unwrap();
  let rendered = DocumentBackend::render(&backend, &document).unwrap();
  DocumentBackend::write(&backend, &rendered).unwrap();

  assert!(backend.path().exists());
  assert_eq!(backend.read().unwrap(), Some(document));

  let mut staging = backend.path().as_os_str().to_owned();
  staging.push(".tmp");
  assert!(!std::path::Path::new(&staging).exists());
}

// ─── Backups ─────────────────────────────────────────────────────────────────

#[test]
fn backup_of_missing_file_is_none() {
  let dir = TempDir::new().unwrap();
  assert!(backend(&dir).backup_copy("error").unwrap().is_none());
}

#[test]
fn backup_copies_the_current_file() {
  let dir = TempDir::new().unwrap();
  let backend = backend(&dir);
  backend.write_str("survival-staff-mode: {}\n").unwrap();

  let copy = backend.backup_copy("error").unwrap().unwrap();
  assert!(copy.starts_with(backend.backups_dir()));

  let name = copy.file_name().unwrap().to_string_lossy().into_owned();
  assert!(name.starts_with("survival-staff-mode.data.error."), "{name}");
  assert!(name.ends_with(".yml"), "{name}");
  assert_eq!(fs::read_to_string(&copy).unwrap(), "survival-staff-mode: {}\n");
}

// ─── With the profile store ──────────────────────────────────────────────────

fn manager(backend: &YamlFileBackend) -> StaffModeManager<FakeDirectory, RecordingBus> {
  let registry = SnapshotRegistry::with_defaults("survivalstaffmode").unwrap();
  let store = ProfileStore::new(Arc::new(backend.clone()), registry, "survival-staff-mode");
  StaffModeManager::new(store, FakeDirectory::new(), RecordingBus::new())
}

#[test]
fn corrupt_file_is_backed_up_and_left_in_place() {
  let dir = TempDir::new().unwrap();
  let backend = backend(&dir);
  backend.write_str("survival-staff-mode: [unclosed").unwrap();

  let mut mgr = manager(&backend);
  assert!(mgr.load().is_err());

  let backups: Vec<_> = fs::read_dir(backend.backups_dir()).unwrap().collect();
  assert_eq!(backups.len(), 1);
  assert_eq!(
    fs::read_to_string(backend.path()).unwrap(),
    "survival-staff-mode: [unclosed"
  );
}

#[tokio::test]
async fn toggled_profile_survives_a_restart() {
  let dir = TempDir::new().unwrap();
  let backend = backend(&dir);

  let mut mgr = manager(&backend);
  assert_eq!(mgr.load().unwrap(), 0);
  let id = mgr.directory_mut().connect(FakeSubject::staff("Alex"));
  assert_eq!(mgr.online_member(id).unwrap().set_mode(Mode::Staff), ToggleSwitch::Success);

  let SaveOutcome::Scheduled(task) = mgr.save_if_dirty(Concurrency::Async).unwrap() else {
    panic!("expected a scheduled save");
  };
  assert!(task.await.unwrap());

  let mut restarted = manager(&backend);
  assert_eq!(restarted.load().unwrap(), 1);
  let mut profile = restarted.member(id).unwrap();
  assert_eq!(profile.last_toggled_mode(), Some(Mode::Staff));
  assert!(profile.snapshot(Mode::Survival).is_some());
  assert!(profile.snapshot(Mode::Staff).is_none());
}
