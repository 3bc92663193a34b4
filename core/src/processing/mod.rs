pub mod classifier;
pub mod speed;

pub use classifier::{ClassifierConfig, ObstacleClassifier};
pub use speed::{SpeedConfig, SpeedModel, SpeedParameters};
