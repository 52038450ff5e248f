use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use tokio::sync::watch;

use crate::command::{self, DispatchMiss, DispatchPolicy};
use crate::descriptor::StateTable;
use crate::state::{OwnerCell, StateId, TickKind};

/// The façade the host interacts with: owns the state table, the host
/// instance, the pending-transition queue and the current-state cell.
///
/// The machine never ticks itself.  The host's scheduler calls
/// [`update`](StateMachine::update) / [`late_update`](StateMachine::late_update)
/// / [`fixed_update`](StateMachine::fixed_update) at whatever cadence it
/// likes; exit/enter sequences run on the tokio runtime the machine was
/// built under.  Everything is single-threaded cooperative: the only
/// concurrency is suspension inside enter/exit sequences.
///
/// Current state is `None` exactly while an exit/enter sequence is in
/// flight; tick hooks and (by default) command dispatch are suppressed for
/// that entire window.
///
/// There is no cancellation and no watchdog: a sequence that never
/// completes parks the machine at the in-flight sentinel and starves the
/// queue.
pub struct StateMachine<O, S: StateId, R> {
  name: &'static str,
  owner: OwnerCell<O>,
  table: Arc<StateTable<O, R>>,
  shared: Arc<Shared<S>>,
  policy: DispatchPolicy,
}

struct Shared<S> {
  /// FIFO of requested targets.  The front entry is the one being actively
  /// transitioned; later requests wait behind it in submission order.
  queue: Mutex<VecDeque<S>>,
  current_tx: watch::Sender<Option<S>>,

  /// Retained so the sender side never observes a closed channel.
  current_rx: watch::Receiver<Option<S>>,
}

impl<O, S: StateId, R> Clone for StateMachine<O, S, R> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      owner: self.owner.clone(),
      table: self.table.clone(),
      shared: self.shared.clone(),
      policy: self.policy,
    }
  }
}

impl<O, S, R> StateMachine<O, S, R>
where
  O: Send + 'static,
  S: StateId,
  R: Debug + Send + 'static,
{
  pub(crate) fn new(
    name: &'static str,
    owner: O,
    table: StateTable<O, R>,
    initial: S,
    policy: DispatchPolicy,
  ) -> Self {
    debug_assert_eq!(table.len(), S::COUNT);
    let (current_tx, current_rx) = watch::channel(Some(initial));
    Self {
      name,
      owner: Arc::new(tokio::sync::Mutex::new(owner)),
      table: Arc::new(table),
      shared: Arc::new(Shared { queue: Mutex::new(VecDeque::new()), current_tx, current_rx }),
      policy,
    }
  }

  /// The typed current state, or `None` while a state change is in flight.
  pub fn current_state(&self) -> Option<S> {
    *self.shared.current_rx.borrow()
  }

  /// Watch current-state changes, including the in-flight `None` windows.
  pub fn subscribe(&self) -> watch::Receiver<Option<S>> {
    self.shared.current_rx.clone()
  }

  /// Shared handle to the host instance the machine was built with.
  pub fn owner(&self) -> OwnerCell<O> {
    self.owner.clone()
  }

  /// Enqueue a transition to `target`.  If no change is already in flight
  /// the exit/enter sequence is kicked off before this call returns (the
  /// sequence itself completes later, on the runtime); otherwise the
  /// request waits its turn.  Requests are never coalesced or cancelled.
  pub fn request_state_change(&self, target: S) {
    let pending = {
      let mut queue = self.shared.queue.lock().unwrap();
      queue.push_back(target);
      queue.len()
    };
    if pending == 1 {
      self.solve();
    }
  }

  /// Start processing the front of the queue.  Leading requests for the
  /// already-current state clear themselves without a transition; the first
  /// real target flips the current-state cell to the in-flight sentinel
  /// before any suspension point, then hands the sequence to the runtime.
  fn solve(&self) {
    let current = self.current_state();
    let target = {
      let mut queue = self.shared.queue.lock().unwrap();
      loop {
        match queue.front().copied() {
          None => return,
          Some(target) if Some(target) == current => {
            queue.pop_front();
          }
          Some(target) => break target,
        }
      }
    };

    let outgoing = current.unwrap();
    self.shared.current_tx.send(None).ok();

    let machine = self.clone();
    tokio::spawn(async move {
      machine.drive(outgoing, target).await;
    });
  }

  /// Trampoline over the queue: one transition at a time, exit fully before
  /// enter, strictly in submission order, until no request remains.
  async fn drive(&self, mut outgoing: S, mut target: S) {
    loop {
      debug!("{}: [{:?}] => [{:?}]", self.name, outgoing, target);
      (self.table.lookup(outgoing.index()).on_exit)(self.owner.clone()).await;
      (self.table.lookup(target.index()).on_enter)(self.owner.clone()).await;
      self.shared.current_tx.send(Some(target)).ok();

      let next = {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.pop_front();
        loop {
          match queue.front().copied() {
            None => break None,
            Some(next) if next == target => {
              queue.pop_front();
            }
            Some(next) => break Some(next),
          }
        }
      };
      match next {
        None => break,
        Some(next_target) => {
          self.shared.current_tx.send(None).ok();
          outgoing = target;
          target = next_target;
        }
      }
    }
  }

  pub async fn update(&self) {
    self.tick(TickKind::Update).await;
  }

  pub async fn late_update(&self) {
    self.tick(TickKind::LateUpdate).await;
  }

  pub async fn fixed_update(&self) {
    self.tick(TickKind::FixedUpdate).await;
  }

  async fn tick(&self, kind: TickKind) {
    let state = match self.current_state() {
      Some(state) => state,
      None => {
        trace!("{}: {:?} suppressed, state change in flight", self.name, kind);
        return;
      }
    };
    let descriptor = self.table.lookup(state.index());
    let mut owner = self.owner.lock().await;
    descriptor.tick(kind, &mut owner);
  }

  /// Route `request` to the first handler of the active state that claims
  /// it.  Synchronous with respect to the caller; does not touch the
  /// transition queue.
  pub async fn submit_command(&self, request: R) -> Result<(), DispatchMiss<R>> {
    let state = match self.current_state() {
      Some(state) => state,
      None => {
        return match self.policy {
          DispatchPolicy::RejectMidTransition => {
            debug!("{}: command [{:?}] rejected, state change in flight", self.name, request);
            Err(DispatchMiss::MidTransition(request))
          }
          DispatchPolicy::AttemptMidTransition => {
            // No active state means no handler set to scan.
            log::error!("{}: no handler available for [{:?}]", self.name, request);
            Err(DispatchMiss::Unclaimed(request))
          }
        };
      }
    };
    let descriptor = self.table.lookup(state.index());
    let mut owner = self.owner.lock().await;
    command::dispatch(self.name, descriptor, &mut owner, request)
  }
}
