pub mod input;
pub mod time;

pub use input::{Action, InputSampler};
pub use time::{FrameClock, TICK_INTERVAL};
