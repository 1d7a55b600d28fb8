//! The main loop.
//!
//! Every profile mutation happens on the task that awaits [`run`]: commands
//! from the host and the periodic tasks are processed one at a time, each to
//! completion. Only writes of already-rendered documents leave this task.

use chrono::Utc;
use staffmode_core::{
  Mode,
  events::EventBus,
  manager::StaffModeManager,
  profile::{StaffMember, ToggleSwitch},
  store::{Concurrency, SaveOutcome},
  subject::{Directory, GameMode, PotionEffect},
};
use tokio::{
  sync::{mpsc, oneshot},
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
  Result, TaskConfig,
  interactions::{self, DeathOutcome, Interaction},
};

/// Requests from the host.
#[derive(Debug)]
pub enum Command {
  /// A subject connected. The host's directory must already resolve them.
  Join(Uuid),
  /// A subject is disconnecting. Sent before the host drops their handle.
  Quit(Uuid),
  /// Switch to `target`, or to the other mode if `None`. Replies `None` if
  /// the subject is not an online staff member.
  Toggle {
    id:     Uuid,
    target: Option<Mode>,
    reply:  oneshot::Sender<Option<ToggleSwitch>>,
  },
  /// Flip the night vision setting. Replies with the new value.
  NightVision {
    id:    Uuid,
    reply: oneshot::Sender<Option<bool>>,
  },
  /// Flip the spectator setting. Replies with the new value.
  Spectator {
    id:    Uuid,
    reply: oneshot::Sender<Option<bool>>,
  },
  /// Whether to cancel an interaction. Replies `false` for subjects that
  /// are not protected.
  Interaction {
    id:          Uuid,
    interaction: Interaction,
    reply:       oneshot::Sender<bool>,
  },
  /// The subject died. Replies with the outcome to force, if any.
  Death {
    id:    Uuid,
    reply: oneshot::Sender<Option<DeathOutcome>>,
  },
  /// The subject's game mode changed.
  GameModeChanged(Uuid),
  Shutdown,
}

/// Drive `manager` until a [`Command::Shutdown`] arrives or every sender is
/// dropped, then flush to disk synchronously and hand the manager back.
pub async fn run<D, E>(
  mut manager: StaffModeManager<D, E>,
  tasks: TaskConfig,
  mut commands: mpsc::Receiver<Command>,
) -> Result<StaffModeManager<D, E>>
where
  D: Directory,
  E: EventBus,
{
  let mut sweep = time::interval(tasks.demotion_sweep());
  let mut roster = time::interval(tasks.roster_refresh());
  let mut reminder = time::interval(tasks.reminder());
  for interval in [&mut sweep, &mut roster, &mut reminder] {
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  }

  let mut refreshes: u64 = 0;
  let mut in_flight: Option<JoinHandle<bool>> = None;

  tracing::info!(profiles = manager.store().len(), "staff mode running");

  loop {
    tokio::select! {
      command = commands.recv() => match command {
        None | Some(Command::Shutdown) => break,
        Some(command) => handle(&mut manager, command),
      },

      _ = sweep.tick() => {
        let demoted = manager.sweep();
        if demoted > 0 {
          tracing::info!(demoted, "demotion sweep removed profiles");
        }
      }

      _ = roster.tick() => {
        manager.refresh_roster();
        refreshes += 1;
        if refreshes % tasks.capture_every() == 0 {
          let captured = manager.capture_online();
          tracing::debug!(captured, "captured online staff");
          save_in_background(&mut manager, &mut in_flight);
        }
      }

      _ = reminder.tick() => manager.remind(),
    }
  }

  // A background write finishing after the final one would overwrite it.
  if let Some(task) = in_flight.take()
    && let Err(e) = task.await
  {
    tracing::error!("background save did not complete: {e}");
  }

  manager.save_if_dirty(Concurrency::Sync)?;
  tracing::info!("staff mode stopped");
  Ok(manager)
}

/// Start an asynchronous save unless the previous one is still running.
fn save_in_background<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  in_flight: &mut Option<JoinHandle<bool>>,
) {
  if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
    tracing::debug!("previous save still running; skipping");
    return;
  }

  match manager.save_if_dirty(Concurrency::Async) {
    Ok(SaveOutcome::Scheduled(task)) => *in_flight = Some(task),
    Ok(SaveOutcome::Clean | SaveOutcome::Written) => *in_flight = None,
    Err(e) => tracing::error!("unable to save profile data: {e}"),
  }
}

fn handle<D: Directory, E: EventBus>(manager: &mut StaffModeManager<D, E>, command: Command) {
  match command {
    Command::Join(id) => manager.join(id),
    Command::Quit(id) => manager.quit(id),
    Command::Toggle { id, target, reply } => {
      let outcome = manager.online_member(id).map(|mut member| {
        let target = target.unwrap_or_else(|| member.mode().toggle());
        member.set_mode(target)
      });
      let _ = reply.send(outcome);
    }
    Command::NightVision { id, reply } => {
      let _ = reply.send(toggle_night_vision(manager, id));
    }
    Command::Spectator { id, reply } => {
      let _ = reply.send(toggle_spectator(manager, id));
    }
    Command::Interaction { id, interaction, reply } => {
      let _ = reply.send(interactions::should_cancel(manager, id, interaction, Utc::now()));
    }
    Command::Death { id, reply } => {
      let _ = reply.send(interactions::on_death(manager, id));
    }
    Command::GameModeChanged(id) => {
      interactions::after_game_mode_change(manager, id);
    }
    Command::Shutdown => {}
  }
}

fn toggle_night_vision<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  id: Uuid,
) -> Option<bool> {
  let mut member = manager.online_member(id)?;
  let enabled = !member.night_vision();
  member.set_night_vision(enabled);
  let in_staff_mode = member.mode() == Mode::Staff;

  if in_staff_mode && let Some(subject) = manager.directory_mut().subject_mut(id) {
    if enabled {
      subject.add_potion_effect(&PotionEffect::night_vision());
    } else {
      subject.remove_potion_effect(&PotionEffect::night_vision().kind);
    }
  }
  Some(enabled)
}

pub(crate) fn toggle_spectator<D: Directory, E: EventBus>(
  manager: &mut StaffModeManager<D, E>,
  id: Uuid,
) -> Option<bool> {
  let current = manager.directory().subject(id)?.game_mode();
  let mut member = manager.online_member(id)?;

  let restore = member.game_mode_prior_to_spectator();
  // Already spectating without the setting: return to the remembered mode.
  let prior = if current == GameMode::Spectator { restore } else { current };
  let enable = !member.spectator();
  let enabled = member.set_spectator(enable.then_some(prior));
  let in_staff_mode = member.mode() == Mode::Staff;

  if in_staff_mode && let Some(subject) = manager.directory_mut().subject_mut(id) {
    subject.set_game_mode(if enabled { GameMode::Spectator } else { restore });
  }
  Some(enabled)
}
