pub mod ctx;
pub mod runtime;
pub mod state;

pub use ctx::{RuntimeCommand, TickCtx};
pub use runtime::{Runtime, RuntimeConfig};
pub use state::{AppState, StateId, StateMachine, SwitchParams};
