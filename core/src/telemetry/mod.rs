pub mod log;
pub mod metrics;

pub use self::log::StatusReporter;
pub use metrics::SessionStats;
