//! Adaptive detection-and-control core for screen-driven reflex automation.
//!
//! A fixed screen region is sampled on a cadence, classified by brightness
//! (with day/night polarity tracking), and a single action fires whenever an
//! obstacle shows up. Pacing and the detection bar tighten as the session's
//! speed model ramps up. Capture, input injection and persistence stay
//! behind the collaborator traits in [`prelude`].

pub mod control;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use control::{ControlLoop, LoopSettings, SessionOutcome, StopReason};
pub use prelude::{
    ActionSink, Clock, CollaboratorError, DetectionResult, Frame, FrameSource, LoopError,
    LoopResult, Region, ResultStore, SystemClock, VisualMode,
};
