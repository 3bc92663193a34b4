pub mod control_loop;

pub use control_loop::{
    ControlConfig, ControlLoop, LoopSettings, LoopState, SessionOutcome, StopReason,
};
