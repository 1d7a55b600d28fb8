//! Notifications raised to external collaborators during a toggle.
//!
//! A [`ToggleRequest`] is raised before anything changes and may be
//! cancelled. A [`ModeChanged`] is raised after the target mode's state has
//! been applied and is informational only.

use uuid::Uuid;

use crate::{Mode, profile::ProfileSettings, subject::LiveSubject};

fn assert_member(member: Uuid, subject: &dyn LiveSubject) {
  assert_eq!(
    member,
    subject.id(),
    "event subject {} ({}) does not match staff member {member}",
    subject.id(),
    subject.name(),
  );
}

/// A staff member asked to switch to `mode`.
pub struct ToggleRequest<'a> {
  member:    Uuid,
  mode:      Mode,
  subject:   &'a mut dyn LiveSubject,
  cancelled: bool,
}

impl<'a> ToggleRequest<'a> {
  pub fn new(member: Uuid, mode: Mode, subject: &'a mut dyn LiveSubject) -> Self {
    assert_member(member, &*subject);
    Self { member, mode, subject, cancelled: false }
  }

  pub fn member(&self) -> Uuid { self.member }

  /// The requested target mode.
  pub fn mode(&self) -> Mode { self.mode }

  pub fn subject(&self) -> &dyn LiveSubject { &*self.subject }

  pub fn subject_mut(&mut self) -> &mut dyn LiveSubject { &mut *self.subject }

  pub fn is_cancelled(&self) -> bool { self.cancelled }

  pub fn set_cancelled(&mut self, cancelled: bool) { self.cancelled = cancelled; }
}

/// A staff member is now in `mode`.
pub struct ModeChanged<'a> {
  member:   Uuid,
  mode:     Mode,
  previous: Option<Mode>,
  subject:  &'a mut dyn LiveSubject,
  settings: ProfileSettings,
}

impl<'a> ModeChanged<'a> {
  pub fn new(
    member: Uuid,
    mode: Mode,
    previous: Option<Mode>,
    subject: &'a mut dyn LiveSubject,
    settings: ProfileSettings,
  ) -> Self {
    assert_member(member, &*subject);
    Self { member, mode, previous, subject, settings }
  }

  pub fn member(&self) -> Uuid { self.member }

  /// The mode that was entered.
  pub fn mode(&self) -> Mode { self.mode }

  /// The mode that was left, or `None` when effects are re-applied without a
  /// transition (on join, or after a refused override).
  pub fn previous(&self) -> Option<Mode> { self.previous }

  pub fn settings(&self) -> ProfileSettings { self.settings }

  pub fn subject(&self) -> &dyn LiveSubject { &*self.subject }

  pub fn subject_mut(&mut self) -> &mut dyn LiveSubject { &mut *self.subject }
}

pub enum StaffModeEvent<'a> {
  ToggleRequest(ToggleRequest<'a>),
  ModeChanged(ModeChanged<'a>),
}

impl StaffModeEvent<'_> {
  pub fn member(&self) -> Uuid {
    match self {
      Self::ToggleRequest(e) => e.member(),
      Self::ModeChanged(e) => e.member(),
    }
  }

  /// Only toggle requests can be cancelled.
  pub fn is_cancelled(&self) -> bool {
    match self {
      Self::ToggleRequest(e) => e.is_cancelled(),
      Self::ModeChanged(_) => false,
    }
  }
}

/// The host's notification bus.
pub trait EventBus {
  fn publish(&mut self, event: &mut StaffModeEvent<'_>);
}
