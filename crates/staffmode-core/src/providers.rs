//! The default snapshot providers.
//!
//! | key              | facet                         | captured in |
//! |------------------|-------------------------------|-------------|
//! | `stats`          | [`Vitals`]                    | SURVIVAL    |
//! | `position`       | [`Position`]                  | SURVIVAL    |
//! | `inventory`      | [`Inventory`]                 | both modes  |
//! | `potion-effects` | active [`PotionEffect`]s      | SURVIVAL    |
//! | `flight`         | [`Flight`]                    | SURVIVAL    |

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Value, json};

use crate::{
  Mode,
  snapshot::{SnapshotContext, SnapshotError, SnapshotKind, SnapshotProvider, SnapshotValue},
  subject::{Flight, Inventory, ItemStack, Position, PotionEffect, Vitals},
};

fn survival_only(context: &SnapshotContext<'_>) -> bool {
  context.mode() == Mode::Survival
}

fn expect_object(data: &Value) -> Result<(), SnapshotError> {
  if data.is_object() {
    Ok(())
  } else {
    Err(SnapshotError::Malformed(format!("expected a mapping, found {data}")))
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct StatsProvider;

impl SnapshotProvider for StatsProvider {
  fn kind(&self) -> SnapshotKind { SnapshotKind::Stats }

  fn is_applicable(&self, context: &SnapshotContext<'_>) -> bool {
    survival_only(context)
  }

  fn capture(&self, context: &SnapshotContext<'_>) -> Result<SnapshotValue, SnapshotError> {
    Ok(SnapshotValue::Stats(context.subject().vitals()))
  }

  fn serialize(&self, value: &SnapshotValue) -> Result<Value, SnapshotError> {
    let SnapshotValue::Stats(vitals) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    Ok(serde_json::to_value(vitals)?)
  }

  fn deserialize(&self, data: &Value) -> Result<Option<SnapshotValue>, SnapshotError> {
    expect_object(data)?;
    // Missing fields fall back to the healthy baseline.
    let vitals: Vitals = serde_json::from_value(data.clone())?;
    Ok(Some(SnapshotValue::Stats(vitals)))
  }

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError> {
    let SnapshotValue::Stats(vitals) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    context.subject_mut().set_vitals(vitals)?;
    Ok(())
  }
}

// ─── Position ────────────────────────────────────────────────────────────────

/// Staff mode has no meaningful position of its own, so only the survival
/// position is tracked.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionProvider;

impl SnapshotProvider for PositionProvider {
  fn kind(&self) -> SnapshotKind { SnapshotKind::Position }

  fn is_applicable(&self, context: &SnapshotContext<'_>) -> bool {
    survival_only(context)
  }

  fn capture(&self, context: &SnapshotContext<'_>) -> Result<SnapshotValue, SnapshotError> {
    Ok(SnapshotValue::Position(context.subject().position()))
  }

  fn serialize(&self, value: &SnapshotValue) -> Result<Value, SnapshotError> {
    let SnapshotValue::Position(position) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    Ok(serde_json::to_value(position)?)
  }

  fn deserialize(&self, data: &Value) -> Result<Option<SnapshotValue>, SnapshotError> {
    expect_object(data)?;

    let has_world = data.get("world").is_some_and(Value::is_string);
    let has_coordinates = data
      .get("coordinates")
      .is_some_and(|c| ["x", "y", "z"].iter().all(|axis| c.get(axis).is_some()));

    if !has_world || !has_coordinates {
      return Ok(None);
    }

    let position: Position = serde_json::from_value(data.clone())?;
    Ok(Some(SnapshotValue::Position(position)))
  }

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError> {
    let SnapshotValue::Position(position) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    context.subject_mut().teleport(position)?;
    Ok(())
  }
}

// ─── Inventory ───────────────────────────────────────────────────────────────

/// Marks an empty slot in the slot framing.
const EMPTY_SLOT: u32 = u32::MAX;

/// Encode a slot list as base64 over `u32 count, (u32 len, bytes)*`, big
/// endian, with [`EMPTY_SLOT`] in place of the length for empty slots.
pub fn encode_slots(slots: &[Option<ItemStack>]) -> Result<String, SnapshotError> {
  let mut buf = BytesMut::new();
  buf.put_u32(frame_len(slots.len())?);

  for slot in slots {
    match slot {
      Some(ItemStack(bytes)) => {
        buf.put_u32(frame_len(bytes.len())?);
        buf.put_slice(bytes);
      }
      None => buf.put_u32(EMPTY_SLOT),
    }
  }

  Ok(STANDARD.encode(buf))
}

/// A length as it is written to the frame. Lengths that do not fit below
/// [`EMPTY_SLOT`] are rejected.
pub(crate) fn frame_len(len: usize) -> Result<u32, SnapshotError> {
  u32::try_from(len)
    .ok()
    .filter(|len| *len != EMPTY_SLOT)
    .ok_or_else(|| SnapshotError::Malformed(format!("{len} bytes do not fit a slot frame")))
}

/// Inverse of [`encode_slots`]. An empty string decodes to no slots.
pub fn decode_slots(encoded: &str) -> Result<Vec<Option<ItemStack>>, SnapshotError> {
  if encoded.is_empty() {
    return Ok(Vec::new());
  }

  let raw = STANDARD
    .decode(encoded)
    .map_err(|e| SnapshotError::Malformed(format!("invalid base64: {e}")))?;
  let mut buf = Bytes::from(raw);

  let truncated = || SnapshotError::Malformed("truncated slot data".to_owned());

  if buf.remaining() < 4 {
    return Err(truncated());
  }
  let count = buf.get_u32() as usize;
  let mut slots = Vec::with_capacity(count.min(buf.remaining() / 4));

  for _ in 0..count {
    if buf.remaining() < 4 {
      return Err(truncated());
    }
    let len = buf.get_u32();
    if len == EMPTY_SLOT {
      slots.push(None);
      continue;
    }

    let len = len as usize;
    if buf.remaining() < len {
      return Err(truncated());
    }
    slots.push(Some(ItemStack(buf.split_to(len))));
  }

  Ok(slots)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryProvider;

impl SnapshotProvider for InventoryProvider {
  fn kind(&self) -> SnapshotKind { SnapshotKind::Inventory }

  fn capture(&self, context: &SnapshotContext<'_>) -> Result<SnapshotValue, SnapshotError> {
    Ok(SnapshotValue::Inventory(context.subject().inventory()))
  }

  fn serialize(&self, value: &SnapshotValue) -> Result<Value, SnapshotError> {
    let SnapshotValue::Inventory(inventory) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };

    let main = encode_slots(&inventory.main)?;
    let armor = encode_slots(&inventory.armor)?;
    let extra = encode_slots(&inventory.extra)?;
    Ok(json!({ "main": main, "armor": armor, "extra": extra }))
  }

  fn deserialize(&self, data: &Value) -> Result<Option<SnapshotValue>, SnapshotError> {
    expect_object(data)?;

    let slots = |field: &str| decode_slots(data.get(field).and_then(Value::as_str).unwrap_or(""));

    Ok(Some(SnapshotValue::Inventory(Inventory {
      main:  slots("main")?,
      armor: slots("armor")?,
      extra: slots("extra")?,
    })))
  }

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError> {
    let SnapshotValue::Inventory(inventory) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };

    let subject = context.subject_mut();
    subject.clear_inventory();
    subject.set_inventory(inventory);
    Ok(())
  }
}

// ─── Potion effects ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct PotionEffectsProvider;

impl SnapshotProvider for PotionEffectsProvider {
  fn kind(&self) -> SnapshotKind { SnapshotKind::PotionEffects }

  fn is_applicable(&self, context: &SnapshotContext<'_>) -> bool {
    survival_only(context)
  }

  fn capture(&self, context: &SnapshotContext<'_>) -> Result<SnapshotValue, SnapshotError> {
    Ok(SnapshotValue::PotionEffects(context.subject().potion_effects()))
  }

  fn serialize(&self, value: &SnapshotValue) -> Result<Value, SnapshotError> {
    let SnapshotValue::PotionEffects(effects) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    Ok(serde_json::to_value(effects)?)
  }

  fn deserialize(&self, data: &Value) -> Result<Option<SnapshotValue>, SnapshotError> {
    let Some(entries) = data.as_array() else {
      return Err(SnapshotError::Malformed(format!("expected a list, found {data}")));
    };

    // Individual effects the host no longer understands are dropped.
    let effects = entries
      .iter()
      .filter_map(|entry| serde_json::from_value::<PotionEffect>(entry.clone()).ok())
      .collect();

    Ok(Some(SnapshotValue::PotionEffects(effects)))
  }

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError> {
    let SnapshotValue::PotionEffects(effects) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };

    let subject = context.subject_mut();
    for active in subject.potion_effects() {
      subject.remove_potion_effect(&active.kind);
    }
    for effect in effects {
      subject.add_potion_effect(effect);
    }
    Ok(())
  }
}

// ─── Flight ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct FlightProvider;

impl SnapshotProvider for FlightProvider {
  fn kind(&self) -> SnapshotKind { SnapshotKind::Flight }

  fn is_applicable(&self, context: &SnapshotContext<'_>) -> bool {
    survival_only(context)
  }

  fn capture(&self, context: &SnapshotContext<'_>) -> Result<SnapshotValue, SnapshotError> {
    Ok(SnapshotValue::Flight(context.subject().flight()))
  }

  fn serialize(&self, value: &SnapshotValue) -> Result<Value, SnapshotError> {
    let SnapshotValue::Flight(flight) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    Ok(serde_json::to_value(flight)?)
  }

  fn deserialize(&self, data: &Value) -> Result<Option<SnapshotValue>, SnapshotError> {
    expect_object(data)?;
    let flight: Flight = serde_json::from_value(data.clone())?;
    Ok(Some(SnapshotValue::Flight(flight)))
  }

  fn apply(
    &self,
    context: &mut SnapshotContext<'_>,
    value: &SnapshotValue,
  ) -> Result<(), SnapshotError> {
    let SnapshotValue::Flight(flight) = value else {
      return Err(SnapshotError::mismatch(self.kind(), value));
    };
    context.subject_mut().set_flight(*flight);
    Ok(())
  }
}
