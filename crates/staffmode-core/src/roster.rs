//! Bookkeeping of which staff members are connected.

use std::collections::HashSet;

use uuid::Uuid;

use crate::subject::{Capability, Directory};

/// The staff members currently online. This is an iteration helper; it makes
/// no decisions about who is staff.
#[derive(Debug, Default)]
pub struct OnlineRoster {
  members: HashSet<Uuid>,
}

impl OnlineRoster {
  pub fn new() -> Self { Self::default() }

  pub fn join(&mut self, id: Uuid) { self.members.insert(id); }

  pub fn quit(&mut self, id: Uuid) { self.members.remove(&id); }

  /// Rebuild from whoever is online and holds the staff capability.
  pub fn refresh(&mut self, directory: &dyn Directory) {
    self.members = directory
      .online()
      .into_iter()
      .filter(|id| {
        directory
          .subject(*id)
          .is_some_and(|s| s.has_capability(Capability::StaffMember))
      })
      .collect();
  }

  pub fn contains(&self, id: Uuid) -> bool { self.members.contains(&id) }

  /// Members in a stable order.
  pub fn ids(&self) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = self.members.iter().copied().collect();
    ids.sort();
    ids
  }

  pub fn len(&self) -> usize { self.members.len() }

  pub fn is_empty(&self) -> bool { self.members.is_empty() }
}
