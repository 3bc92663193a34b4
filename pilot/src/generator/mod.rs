pub mod profile;

pub use profile::{SyntheticConfig, SyntheticSource};
