//! The structured key-value document profiles are persisted in.
//!
//! The document is a tree of mappings addressed by key paths. Backends decide
//! how it is rendered on disk; the engine only ever sees this tree.
//!
//! Timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
  root: Map<String, Value>,
}

impl Document {
  pub fn new() -> Self { Self::default() }

  /// Wrap a parsed tree. `null` is treated as an empty document; any other
  /// non-mapping root is rejected.
  pub fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Object(root) => Ok(Self { root }),
      Value::Null => Ok(Self::new()),
      _ => Err(Error::NotAMapping),
    }
  }

  pub fn to_value(&self) -> Value { Value::Object(self.root.clone()) }

  pub fn root(&self) -> &Map<String, Value> { &self.root }

  /// The mapping at `path`, if every segment exists and is a mapping.
  pub fn section(&self, path: &[&str]) -> Option<&Map<String, Value>> {
    section(&self.root, path)
  }

  /// The mapping at `path`, creating (or replacing non-mapping values with)
  /// empty mappings along the way.
  pub fn section_mut(&mut self, path: &[&str]) -> &mut Map<String, Value> {
    section_mut(&mut self.root, path)
  }

  /// Remove the value at `path`, returning it if it existed.
  pub fn remove(&mut self, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    section_mut_existing(&mut self.root, parents)?.shift_remove(*last)
  }
}

pub fn section<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Map<String, Value>> {
  path
    .iter()
    .try_fold(map, |current, segment| current.get(*segment)?.as_object())
}

pub fn section_mut<'a>(map: &'a mut Map<String, Value>, path: &[&str]) -> &'a mut Map<String, Value> {
  let mut current = map;
  for segment in path {
    let entry = current
      .entry((*segment).to_owned())
      .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
      *entry = Value::Object(Map::new());
    }
    current = match entry {
      Value::Object(next) => next,
      _ => unreachable!("entry was just made a mapping"),
    };
  }
  current
}

fn section_mut_existing<'a>(
  map: &'a mut Map<String, Value>,
  path: &[&str],
) -> Option<&'a mut Map<String, Value>> {
  let mut current = map;
  for segment in path {
    current = current.get_mut(*segment)?.as_object_mut()?;
  }
  Some(current)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
}

/// Read an RFC 3339 timestamp stored under `key`.
pub fn get_instant(map: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
  map.get(key).and_then(Value::as_str).and_then(decode_dt)
}

pub fn set_instant(map: &mut Map<String, Value>, key: &str, dt: DateTime<Utc>) {
  map.insert(key.to_owned(), Value::String(encode_dt(dt)));
}
