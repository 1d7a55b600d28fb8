//! An [`EventBus`] that fans notifications out to registered listeners.

use staffmode_core::events::{EventBus, StaffModeEvent};

pub trait Listener {
  fn on_event(&mut self, event: &mut StaffModeEvent<'_>);
}

/// Listeners are called in registration order. Each sees the event as left
/// by the previous one, including a cancellation.
#[derive(Default)]
pub struct EventDispatcher {
  listeners: Vec<Box<dyn Listener>>,
}

impl EventDispatcher {
  pub fn new() -> Self { Self::default() }

  pub fn with<L: Listener + 'static>(mut self, listener: L) -> Self {
    self.register(listener);
    self
  }

  pub fn register<L: Listener + 'static>(&mut self, listener: L) {
    self.listeners.push(Box::new(listener));
  }

  pub fn len(&self) -> usize { self.listeners.len() }

  pub fn is_empty(&self) -> bool { self.listeners.is_empty() }
}

impl EventBus for EventDispatcher {
  fn publish(&mut self, event: &mut StaffModeEvent<'_>) {
    for listener in &mut self.listeners {
      listener.on_event(event);
    }
  }
}
