use crate::math::stats::StatsHelper;
use crate::prelude::{DetectionResult, Frame, LoopError, LoopResult, VisualMode};
use serde::{Deserialize, Serialize};

/// Tunables for the brightness classifier.
///
/// The hysteresis bounds are hand-tuned for one visual target; treat them as
/// configuration rather than invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Luminance strictly below this counts as a dark sample.
    pub brightness_threshold: u8,
    /// LIGHT flips to DARK once the dark ratio reaches this bound.
    pub to_dark_ratio: f64,
    /// DARK flips back to LIGHT once the dark ratio drops to this bound.
    pub to_light_ratio: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 128,
            to_dark_ratio: 0.95,
            to_light_ratio: 0.05,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> LoopResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.to_dark_ratio) || !in_unit(self.to_light_ratio) {
            return Err(LoopError::InvalidConfiguration(
                "hysteresis bounds must lie in [0, 1]".into(),
            ));
        }
        if self.to_light_ratio >= self.to_dark_ratio {
            return Err(LoopError::InvalidConfiguration(format!(
                "to_light_ratio {} must be below to_dark_ratio {}",
                self.to_light_ratio, self.to_dark_ratio
            )));
        }
        Ok(())
    }
}

/// Turns frames into an obstacle decision, tracking which polarity is the
/// background so a day/night inversion does not read as a wall of obstacles.
#[derive(Debug, Clone)]
pub struct ObstacleClassifier {
    config: ClassifierConfig,
    mode: VisualMode,
}

impl ObstacleClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            mode: VisualMode::Light,
        }
    }

    pub fn mode(&self) -> VisualMode {
        self.mode
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// New sessions always begin in LIGHT.
    pub fn reset(&mut self) {
        self.mode = VisualMode::Light;
    }

    /// Mode after observing `dark_ratio`. At most one flip per reading; the
    /// bounds themselves trigger the flip.
    pub fn apply_hysteresis(
        config: &ClassifierConfig,
        mode: VisualMode,
        dark_ratio: f64,
    ) -> VisualMode {
        match mode {
            VisualMode::Light if dark_ratio >= config.to_dark_ratio => VisualMode::Dark,
            VisualMode::Dark if dark_ratio <= config.to_light_ratio => VisualMode::Light,
            unchanged => unchanged,
        }
    }

    pub fn classify(&mut self, frame: &Frame, ratio_threshold: f64) -> DetectionResult {
        let gray = frame.luminance();
        let avg_brightness = StatsHelper::mean(&gray);
        let dark_ratio = StatsHelper::fraction_below(&gray, self.config.brightness_threshold);

        self.mode = Self::apply_hysteresis(&self.config, self.mode, dark_ratio);

        let detect_ratio = match self.mode {
            VisualMode::Light => dark_ratio,
            VisualMode::Dark => 1.0 - dark_ratio,
        };

        DetectionResult {
            is_obstacle: detect_ratio > ratio_threshold,
            avg_brightness,
            detect_ratio,
            dark_ratio,
            mode: self.mode,
        }
    }
}

impl Default for ObstacleClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
