use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

use futures::FutureExt;
use thiserror::Error;

use crate::command::{CommandHandler, DispatchPolicy};
use crate::descriptor::{do_nothing, do_nothing_sequence, StateDescriptor, StateTable};
use crate::machine::StateMachine;
use crate::state::{HookKind, OwnerCell, SequenceFn, StateId, TickFn};

/// Fatal binding problem, surfaced by [`MachineBuilder::build`] before the
/// machine can run a single tick.  Binding errors mean a misconfigured host
/// and are never deferred to runtime.
#[derive(Error, Debug)]
pub enum BindingError {
  #[error("duplicate {hook} binding for state {state}")]
  DuplicateBinding { state: String, hook: HookKind },

  #[error("state {state} reports index {index}, outside the {count}-entry table")]
  IndexOutOfRange { state: String, index: usize, count: usize },
}

/// Explicit registration table mapping `(state, hook)` to a callback.
///
/// This is the binding step: for every declared state the builder produces
/// one descriptor, substituting no-op defaults for anything left
/// unregistered.  Registration stores the callback and nothing more; no hook
/// runs until the machine does.
///
/// Type parameters: `O` is the host instance the callbacks operate on, `S`
/// the state enumeration, `R` the command request payload.
pub struct MachineBuilder<O, S: StateId, R> {
  name: &'static str,
  slots: Vec<BindingSlots<O, R>>,
  policy: DispatchPolicy,
  errors: Vec<BindingError>,
  _states: PhantomData<S>,
}

struct BindingSlots<O, R> {
  on_update: Option<TickFn<O>>,
  on_late_update: Option<TickFn<O>>,
  on_fixed_update: Option<TickFn<O>>,
  on_enter: Option<SequenceFn<O>>,
  on_exit: Option<SequenceFn<O>>,
  command_handlers: Option<Vec<Box<dyn CommandHandler<O, R>>>>,
}

impl<O: 'static, R> BindingSlots<O, R> {
  fn empty() -> Self {
    Self {
      on_update: None,
      on_late_update: None,
      on_fixed_update: None,
      on_enter: None,
      on_exit: None,
      command_handlers: None,
    }
  }

  fn into_descriptor(self) -> StateDescriptor<O, R> {
    StateDescriptor {
      on_update: self.on_update.unwrap_or_else(|| Box::new(do_nothing)),
      on_late_update: self.on_late_update.unwrap_or_else(|| Box::new(do_nothing)),
      on_fixed_update: self.on_fixed_update.unwrap_or_else(|| Box::new(do_nothing)),
      on_enter: self.on_enter.unwrap_or_else(|| Box::new(do_nothing_sequence)),
      on_exit: self.on_exit.unwrap_or_else(|| Box::new(do_nothing_sequence)),
      command_handlers: std::sync::Mutex::new(self.command_handlers.unwrap_or_default()),
    }
  }
}

impl<O: 'static, S: StateId, R> MachineBuilder<O, S, R> {
  pub fn new() -> Self {
    Self {
      name: "machine",
      slots: (0..S::COUNT).map(|_| BindingSlots::empty()).collect(),
      policy: DispatchPolicy::default(),
      errors: vec![],
      _states: PhantomData,
    }
  }

  /// Label used to prefix this machine's log output.
  pub fn debug_name(mut self, name: &'static str) -> Self {
    self.name = name;
    self
  }

  pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn on_update(mut self, state: S, hook: impl Fn(&mut O) + Send + Sync + 'static) -> Self {
    if let Some(slot) = self.claim(state, HookKind::OnUpdate, |slot| slot.on_update.is_some()) {
      slot.on_update = Some(Box::new(hook));
    }
    self
  }

  pub fn on_late_update(mut self, state: S, hook: impl Fn(&mut O) + Send + Sync + 'static) -> Self {
    if let Some(slot) = self.claim(state, HookKind::OnLateUpdate, |slot| slot.on_late_update.is_some()) {
      slot.on_late_update = Some(Box::new(hook));
    }
    self
  }

  pub fn on_fixed_update(mut self, state: S, hook: impl Fn(&mut O) + Send + Sync + 'static) -> Self {
    if let Some(slot) = self.claim(state, HookKind::OnFixedUpdate, |slot| slot.on_fixed_update.is_some()) {
      slot.on_fixed_update = Some(Box::new(hook));
    }
    self
  }

  pub fn on_enter<F, Fut>(mut self, state: S, sequence: F) -> Self
  where
    F: Fn(OwnerCell<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    if let Some(slot) = self.claim(state, HookKind::OnEnter, |slot| slot.on_enter.is_some()) {
      slot.on_enter = Some(Box::new(move |owner| sequence(owner).boxed()));
    }
    self
  }

  pub fn on_exit<F, Fut>(mut self, state: S, sequence: F) -> Self
  where
    F: Fn(OwnerCell<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    if let Some(slot) = self.claim(state, HookKind::OnExit, |slot| slot.on_exit.is_some()) {
      slot.on_exit = Some(Box::new(move |owner| sequence(owner).boxed()));
    }
    self
  }

  /// Ordered handler list for `state`; declared order is dispatch scan order.
  pub fn command_handlers(mut self, state: S, handlers: Vec<Box<dyn CommandHandler<O, R>>>) -> Self {
    if let Some(slot) = self.claim(state, HookKind::CommandHandlers, |slot| slot.command_handlers.is_some()) {
      slot.command_handlers = Some(handlers);
    }
    self
  }

  fn claim(
    &mut self,
    state: S,
    hook: HookKind,
    occupied: fn(&BindingSlots<O, R>) -> bool,
  ) -> Option<&mut BindingSlots<O, R>> {
    let index = state.index();
    if index >= S::COUNT {
      self.errors.push(BindingError::IndexOutOfRange {
        state: format!("{:?}", state),
        index,
        count: S::COUNT,
      });
      return None;
    }
    if occupied(&self.slots[index]) {
      self.errors.push(BindingError::DuplicateBinding { state: format!("{:?}", state), hook });
      return None;
    }
    Some(&mut self.slots[index])
  }

  /// Seal the table and hand the host instance to the machine, which starts
  /// in `initial` without running its enter sequence.  The first recorded
  /// binding problem aborts initialization.
  pub fn build(mut self, owner: O, initial: S) -> Result<StateMachine<O, S, R>, BindingError>
  where
    O: Send + 'static,
    R: Debug + Send + 'static,
  {
    if initial.index() >= S::COUNT {
      self.errors.push(BindingError::IndexOutOfRange {
        state: format!("{:?}", initial),
        index: initial.index(),
        count: S::COUNT,
      });
    }
    if let Some(error) = self.errors.into_iter().next() {
      return Err(error);
    }

    let descriptors = self.slots.into_iter().map(BindingSlots::into_descriptor).collect();
    Ok(StateMachine::new(self.name, owner, StateTable::new(descriptors), initial, self.policy))
  }
}

impl<O: 'static, S: StateId, R> Default for MachineBuilder<O, S, R> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Copy, Clone, Debug, Eq, PartialEq)]
  enum Toggle {
    Off,
    On,
  }

  impl StateId for Toggle {
    const COUNT: usize = 2;

    fn index(self) -> usize {
      self as usize
    }
  }

  /// Deliberately broken enumeration whose index escapes its own table.
  #[derive(Copy, Clone, Debug, Eq, PartialEq)]
  struct Runaway;

  impl StateId for Runaway {
    const COUNT: usize = 1;

    fn index(self) -> usize {
      7
    }
  }

  #[test]
  fn test_duplicate_binding_rejected_at_build() {
    let result = MachineBuilder::<(), Toggle, ()>::new()
      .on_update(Toggle::On, |_| {})
      .on_update(Toggle::On, |_| {})
      .build((), Toggle::Off);

    match result {
      Err(BindingError::DuplicateBinding { state, hook }) => {
        assert_eq!(state, "On");
        assert_eq!(hook, HookKind::OnUpdate);
      }
      _ => panic!("expected a duplicate binding error"),
    }
  }

  #[test]
  fn test_rebinding_a_different_hook_is_fine() {
    let result = MachineBuilder::<(), Toggle, ()>::new()
      .on_update(Toggle::On, |_| {})
      .on_late_update(Toggle::On, |_| {})
      .on_enter(Toggle::On, |_owner| async {})
      .build((), Toggle::Off);

    assert!(result.is_ok());
  }

  #[test]
  fn test_out_of_range_index_rejected_at_build() {
    let result = MachineBuilder::<(), Runaway, ()>::new()
      .on_update(Runaway, |_| {})
      .build((), Runaway);

    match result {
      Err(BindingError::IndexOutOfRange { index, count, .. }) => {
        assert_eq!(index, 7);
        assert_eq!(count, 1);
      }
      _ => panic!("expected an index range error"),
    }
  }
}
