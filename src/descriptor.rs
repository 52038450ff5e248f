use std::sync::Mutex;

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use crate::command::CommandHandler;
use crate::state::{OwnerCell, SequenceFn, TickFn, TickKind};

/// Resolved bundle of callbacks and handlers for one state, built once by
/// the binder and read-only thereafter.  Anything the host left unbound is a
/// documented no-op: tick hooks do nothing, enter/exit sequences complete
/// immediately, the handler list is empty.
pub struct StateDescriptor<O, R> {
  pub(crate) on_update: TickFn<O>,
  pub(crate) on_late_update: TickFn<O>,
  pub(crate) on_fixed_update: TickFn<O>,
  pub(crate) on_enter: SequenceFn<O>,
  pub(crate) on_exit: SequenceFn<O>,

  /// Handlers carry per-dispatch state (the injected request) while the
  /// table itself is shared read-only, hence the interior mutex.  Never
  /// held across a suspension point.
  pub(crate) command_handlers: Mutex<Vec<Box<dyn CommandHandler<O, R>>>>,
}

impl<O, R> StateDescriptor<O, R> {
  pub(crate) fn tick(&self, kind: TickKind, owner: &mut O) {
    match kind {
      TickKind::Update => (self.on_update)(owner),
      TickKind::LateUpdate => (self.on_late_update)(owner),
      TickKind::FixedUpdate => (self.on_fixed_update)(owner),
    }
  }
}

pub(crate) fn do_nothing<O>(_owner: &mut O) {}

pub(crate) fn do_nothing_sequence<O>(_owner: OwnerCell<O>) -> BoxFuture<'static, ()> {
  future::ready(()).boxed()
}

/// Total mapping from state index to descriptor.  Exclusively owned by the
/// machine and never mutated after initialization.
pub struct StateTable<O, R> {
  descriptors: Vec<StateDescriptor<O, R>>,
}

impl<O, R> StateTable<O, R> {
  pub(crate) fn new(descriptors: Vec<StateDescriptor<O, R>>) -> Self {
    Self { descriptors }
  }

  pub(crate) fn lookup(&self, index: usize) -> &StateDescriptor<O, R> {
    &self.descriptors[index]
  }

  pub(crate) fn len(&self) -> usize {
    self.descriptors.len()
  }
}
