use std::fmt::Debug;

use log::error;
use thiserror::Error;

use crate::descriptor::StateDescriptor;

/// Dispatch lifecycle of a handler.  The dispatcher only ever drives
/// `Idle` -> `Running` (via `CommandSlot::begin`); `Finished` and `Failed`
/// exist for handlers that want to signal completion to their own host code
/// and are never read by the dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandlerState {
  Idle,
  Running,
  Finished,
  Failed,
}

/// A polymorphic unit capable of claiming and executing a command request
/// while its owning state is active.  Constructed once at binding time and
/// reused across dispatches; the injected request is reassigned on every
/// dispatch.
///
/// The `owner` argument to [`execute`](CommandHandler::execute) is the one
/// sanctioned path for handlers to mutate host data outside the state table.
pub trait CommandHandler<O, R>: Send {
  fn can_handle(&self, request: &R) -> bool;

  fn inject(&mut self, request: R);

  fn execute(&mut self, owner: &mut O);
}

/// Embeddable request + lifecycle cell for handler implementations, so each
/// handler doesn't re-derive the same two fields.  `inject` resets the cell
/// for a fresh dispatch; `begin` hands the request to the handler body and
/// marks it running.
#[derive(Debug)]
pub struct CommandSlot<R> {
  state: HandlerState,
  request: Option<R>,
}

impl<R> CommandSlot<R> {
  pub fn new() -> Self {
    Self { state: HandlerState::Idle, request: None }
  }

  pub fn inject(&mut self, request: R) {
    self.state = HandlerState::Idle;
    self.request = Some(request);
  }

  pub fn begin(&mut self) -> Option<R> {
    self.state = HandlerState::Running;
    self.request.take()
  }

  pub fn state(&self) -> HandlerState {
    self.state
  }

  pub fn finish(&mut self) {
    self.state = HandlerState::Finished;
  }

  pub fn fail(&mut self) {
    self.state = HandlerState::Failed;
  }
}

impl<R> Default for CommandSlot<R> {
  fn default() -> Self {
    Self::new()
  }
}

/// Soft dispatch failure.  Hands the request back to the caller, who decides
/// whether the miss matters; nothing was mutated on this path.
#[derive(Error, Debug)]
pub enum DispatchMiss<R> {
  /// No handler in the active state claimed the request.  Expected and
  /// frequent, e.g. a command irrelevant to the current state.
  #[error("no handler claimed the request")]
  Unclaimed(R),

  /// A state change was in flight, so there was no well-defined active
  /// handler set.  Only produced under [`DispatchPolicy::RejectMidTransition`].
  #[error("rejected while a state change is in flight")]
  MidTransition(R),
}

impl<R> DispatchMiss<R> {
  pub fn into_request(self) -> R {
    match self {
      DispatchMiss::Unclaimed(request) => request,
      DispatchMiss::MidTransition(request) => request,
    }
  }
}

/// What to do with a command submitted while an exit/enter sequence is still
/// in flight (current state reads as none).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchPolicy {
  /// Refuse outright with [`DispatchMiss::MidTransition`].
  RejectMidTransition,

  /// Scan anyway.  No state is active so there is no handler set to search,
  /// which makes this equivalent to an always-miss; kept for hosts that
  /// want every miss reported uniformly as unclaimed.
  AttemptMidTransition,
}

impl Default for DispatchPolicy {
  fn default() -> Self {
    DispatchPolicy::RejectMidTransition
  }
}

/// Linear scan in declared order; first handler claiming the request wins
/// and sees exactly one inject+execute.
pub(crate) fn dispatch<O, R: Debug>(
  name: &str,
  descriptor: &StateDescriptor<O, R>,
  owner: &mut O,
  request: R,
) -> Result<(), DispatchMiss<R>> {
  let mut handlers = descriptor.command_handlers.lock().unwrap();
  match handlers.iter_mut().find(|handler| handler.can_handle(&request)) {
    Some(handler) => {
      handler.inject(request);
      handler.execute(owner);
      Ok(())
    }
    None => {
      error!("{}: no handler available for [{:?}]", name, request);
      Err(DispatchMiss::Unclaimed(request))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_slot_begin_marks_running_and_yields_request() {
    let mut slot = CommandSlot::new();
    assert_eq!(slot.state(), HandlerState::Idle);

    slot.inject("ping");
    assert_eq!(slot.state(), HandlerState::Idle);
    assert_eq!(slot.begin(), Some("ping"));
    assert_eq!(slot.state(), HandlerState::Running);

    // The request is consumed; a second begin has nothing to hand out.
    assert_eq!(slot.begin(), None);
  }

  #[test]
  fn test_slot_reinjection_resets_terminal_states() {
    let mut slot = CommandSlot::new();
    slot.inject(1);
    slot.begin();
    slot.finish();
    assert_eq!(slot.state(), HandlerState::Finished);

    slot.inject(2);
    assert_eq!(slot.state(), HandlerState::Idle);
    assert_eq!(slot.begin(), Some(2));

    slot.fail();
    assert_eq!(slot.state(), HandlerState::Failed);
  }

  #[test]
  fn test_miss_hands_the_request_back() {
    let miss = DispatchMiss::Unclaimed("pong");
    assert_eq!(miss.into_request(), "pong");

    let miss = DispatchMiss::MidTransition("pong");
    assert_eq!(miss.into_request(), "pong");
  }
}
