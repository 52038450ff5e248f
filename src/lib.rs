pub mod builder;
pub mod command;
pub mod descriptor;
pub mod machine;
pub mod state;

pub use builder::{BindingError, MachineBuilder};
pub use command::{CommandHandler, CommandSlot, DispatchMiss, DispatchPolicy, HandlerState};
pub use machine::StateMachine;
pub use state::{HookKind, OwnerCell, StateId, TickKind};
