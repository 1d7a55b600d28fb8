//! Subcommands against a data file in a temporary directory.

use std::fs;

use staffmode_service::ServiceConfig;
use tempfile::TempDir;
use uuid::Uuid;

use crate::commands;

const ALEX: &str = "0b6a1f0e-8d4e-4a53-9f57-3f0a8e4f6c11";
const BLAIR: &str = "5d0c6a9b-2f3e-4c1d-8e7f-9a0b1c2d3e4f";

fn data_file() -> String {
  format!(
    r#"survival-staff-mode:
  profiles:
    {ALEX}:
      meta:
        name: Alex
        mode: STAFF
        timestamp: "2024-05-01T12:00:00+00:00"
        settings:
          night-vision: "2024-05-01T12:00:00+00:00"
      modes:
        SURVIVAL:
          updated: "2024-05-01T12:00:00+00:00"
          snapshots:
            survivalstaffmode:stats:
              level: 12
              health: 7.0
            survivalstaffmode:flight:
              allowed: false
              flying: false
            dynmap:visibility:
              hidden: true
    {BLAIR}:
      meta:
        name: Blair
      modes:
        STAFF:
          updated: "2024-05-01T12:00:00+00:00"
          snapshots:
            survivalstaffmode:inventory: "not a mapping"
"#
  )
}

fn setup() -> (TempDir, ServiceConfig) {
  let dir = TempDir::new().unwrap();
  let config = ServiceConfig {
    data_file: dir.path().join("data.yml"),
    backups_dir: dir.path().join("backups"),
    ..ServiceConfig::default()
  };
  fs::write(&config.data_file, data_file()).unwrap();
  (dir, config)
}

fn output(run: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
  let mut out = Vec::new();
  run(&mut out).unwrap();
  String::from_utf8(out).unwrap()
}

#[test]
fn list_shows_every_profile() {
  let (_dir, config) = setup();
  let mut data = commands::open(&config).unwrap();

  let text = output(|out| commands::list(&mut data, out));
  let lines: Vec<&str> = text.lines().collect();
  assert_eq!(lines.len(), 2);
  assert!(lines[0].starts_with(ALEX) && lines[0].contains("Alex") && lines[0].contains("STAFF"));
  assert!(lines[1].starts_with(BLAIR) && lines[1].contains("never toggled"));
}

#[test]
fn show_summarises_snapshots_and_settings() {
  let (_dir, config) = setup();
  let mut data = commands::open(&config).unwrap();

  let text = output(|out| commands::show(&mut data, ALEX.parse().unwrap(), out));
  assert!(text.contains("night vision on, spectator off"));
  assert!(text.contains("[survivalstaffmode:stats, survivalstaffmode:flight]"));
  assert!(text.contains("STAFF: no snapshot"));
  assert!(text.contains("dynmap:visibility"));
}

#[test]
fn show_unknown_profile_fails() {
  let (_dir, config) = setup();
  let mut data = commands::open(&config).unwrap();

  let mut out = Vec::new();
  assert!(commands::show(&mut data, Uuid::new_v4(), &mut out).is_err());
}

#[test]
fn check_counts_unreadable_entries_only() {
  let (_dir, config) = setup();
  let data = commands::open(&config).unwrap();

  let mut out = Vec::new();
  let problems = commands::check(&data, &mut out).unwrap();
  let text = String::from_utf8(out).unwrap();

  assert_eq!(problems, 1, "{text}");
  assert!(text.contains("survivalstaffmode:inventory is unreadable"));
  assert!(text.contains("dynmap:visibility has no registered provider"));
}

#[test]
fn remove_backs_up_then_deletes() {
  let (_dir, config) = setup();
  let mut data = commands::open(&config).unwrap();
  let id: Uuid = BLAIR.parse().unwrap();

  let text = output(|out| commands::remove(&mut data, id, out));
  assert!(text.contains("backed up to"));

  let backups: Vec<_> = fs::read_dir(&config.backups_dir).unwrap().collect();
  assert_eq!(backups.len(), 1);

  let mut reopened = commands::open(&config).unwrap();
  let remaining = output(|out| commands::list(&mut reopened, out));
  assert!(!remaining.contains(BLAIR));
  assert!(remaining.contains(ALEX));
}
