pub mod capture;
pub mod keyboard;
pub mod store;

pub use capture::ScreenSource;
pub use keyboard::{ActionKey, KeyboardSink, LoggingSink};
pub use store::JsonResultStore;
