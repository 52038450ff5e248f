use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

/// Closed enumeration of state identifiers declared by the host.
///
/// Every value must report a stable index in `0..COUNT`; the machine builds
/// exactly one descriptor per index up front and uses the index for O(1)
/// table lookup.  The usual implementation is a field-less enum with
/// `self as usize`.
pub trait StateId: Copy + Eq + Debug + Send + Sync + 'static {
  const COUNT: usize;

  fn index(self) -> usize;
}

/// The three per-frame hook variants the host's scheduler drives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickKind {
  Update,
  LateUpdate,
  FixedUpdate,
}

/// Names the bindable members of a state, for binding diagnostics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookKind {
  OnUpdate,
  OnLateUpdate,
  OnFixedUpdate,
  OnEnter,
  OnExit,
  CommandHandlers,
}

impl fmt::Display for HookKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      HookKind::OnUpdate => "OnUpdate",
      HookKind::OnLateUpdate => "OnLateUpdate",
      HookKind::OnFixedUpdate => "OnFixedUpdate",
      HookKind::OnEnter => "OnEnter",
      HookKind::OnExit => "OnExit",
      HookKind::CommandHandlers => "CommandHandlers",
    };
    f.write_str(label)
  }
}

/// Shared cell holding the host instance.  Tick hooks, enter/exit sequences
/// and command handlers all reach the host through it; the in-flight
/// sentinel keeps those accesses mutually exclusive in time, so the lock is
/// uncontended in practice.
pub type OwnerCell<O> = Arc<Mutex<O>>;

/// A plain per-tick callback bound to one state.
pub type TickFn<O> = Box<dyn Fn(&mut O) + Send + Sync>;

/// A suspendable enter/exit sequence.  The sequence may suspend any number
/// of times (including zero) before completing; the transition engine waits
/// for full completion before moving on.
pub type SequenceFn<O> = Box<dyn Fn(OwnerCell<O>) -> BoxFuture<'static, ()> + Send + Sync>;
