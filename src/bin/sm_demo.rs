//! Drive a small door state machine from a per-frame loop:
//!
//! 1. Knock while the door is closed (the closed state answers)
//! 2. Swing the door open (timed enter sequence; ticks pause meanwhile)
//! 3. Knock again while open (no handler, reported as a soft miss)
//! 4. Swing it closed and repeat
//!
//! Run with RUST_LOG=debug to watch the transition engine work.

use clap::Parser;
use derive_new::new;
use log::info;
use tokio::time::{interval, Duration};

use framestate::{CommandHandler, CommandSlot, MachineBuilder, StateId, StateMachine};

#[derive(Parser, Debug)]
#[clap(name = "sm_demo")]
struct Opts {
    #[clap(short, long, default_value = "3")]
    cycles: u32,
}

const TICK_INTERVAL: Duration = Duration::from_millis(20);
const SWING_TIME: Duration = Duration::from_millis(200);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum DoorState {
    Closed,
    Open,
}

impl StateId for DoorState {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
enum DoorRequest {
    Knock,
}

#[derive(new)]
struct DoorPanel {
    #[new(default)]
    knocks_heard: u32,
    #[new(default)]
    swings: u32,
    #[new(default)]
    frames: u64,
}

#[derive(new)]
struct KnockHandler {
    #[new(default)]
    slot: CommandSlot<DoorRequest>,
}

impl CommandHandler<DoorPanel, DoorRequest> for KnockHandler {
    fn can_handle(&self, request: &DoorRequest) -> bool {
        matches!(request, DoorRequest::Knock)
    }

    fn inject(&mut self, request: DoorRequest) {
        self.slot.inject(request);
    }

    fn execute(&mut self, owner: &mut DoorPanel) {
        self.slot.begin();
        owner.knocks_heard += 1;
        info!("knock #{} answered: come in!", owner.knocks_heard);
        self.slot.finish();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let machine = MachineBuilder::<DoorPanel, DoorState, DoorRequest>::new()
        .debug_name("door")
        .on_update(DoorState::Closed, |panel| panel.frames += 1)
        .on_update(DoorState::Open, |panel| panel.frames += 1)
        .on_enter(DoorState::Open, |owner| async move {
            info!("door swinging open...");
            tokio::time::sleep(SWING_TIME).await;
            owner.lock().await.swings += 1;
            info!("door open");
        })
        .on_enter(DoorState::Closed, |owner| async move {
            info!("door swinging closed...");
            tokio::time::sleep(SWING_TIME).await;
            owner.lock().await.swings += 1;
            info!("door closed");
        })
        .command_handlers(DoorState::Closed, vec![Box::new(KnockHandler::new())])
        .build(DoorPanel::new(), DoorState::Closed)?;

    for cycle in 0..opts.cycles {
        info!("cycle {}", cycle + 1);

        machine.submit_command(DoorRequest::Knock).await.ok();

        machine.request_state_change(DoorState::Open);
        settle(&machine, DoorState::Open).await;

        if let Err(miss) = machine.submit_command(DoorRequest::Knock).await {
            info!("unanswered: {}", miss);
        }

        machine.request_state_change(DoorState::Closed);
        settle(&machine, DoorState::Closed).await;
    }

    let panel = machine.owner();
    let panel = panel.lock().await;
    info!(
        "done: {} knocks answered, {} swings, {} frames ticked",
        panel.knocks_heard, panel.swings, panel.frames
    );
    Ok(())
}

/// Per-frame loop: keep driving the tick hooks until the requested state
/// lands.  Ticks issued while the swing sequence is still in flight are
/// suppressed by the machine.
async fn settle(machine: &StateMachine<DoorPanel, DoorState, DoorRequest>, target: DoorState) {
    let mut ticker = interval(TICK_INTERVAL);
    while machine.current_state() != Some(target) {
        ticker.tick().await;
        machine.update().await;
        machine.late_update().await;
        machine.fixed_update().await;
    }
}
