pub mod region;
pub mod report;

pub use region::RegionConfig;
pub use report::{PlayHistory, SessionReport};
