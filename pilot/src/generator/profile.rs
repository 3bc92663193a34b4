use anyhow::ensure;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reflexcore::prelude::{CollaboratorError, Frame, FrameSource, Region};
use serde::{Deserialize, Serialize};

/// Shape of the synthetic side-scroller used for headless runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    /// Chance per frame that a new obstacle enters while the lane is clear.
    pub spawn_chance: f64,
    /// Pixels an obstacle moves left per frame.
    pub scroll_px: u32,
    /// Obstacle width as a fraction of the region width.
    pub obstacle_width_frac: f64,
    /// Obstacle height as a fraction of the region height.
    pub obstacle_height_frac: f64,
    /// Frames between day/night palette inversions; 0 keeps it daytime.
    pub invert_every: u64,
    /// Uniform brightness jitter applied to every sample.
    pub noise: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            spawn_chance: 0.04,
            scroll_px: 6,
            obstacle_width_frac: 0.12,
            obstacle_height_frac: 0.6,
            invert_every: 1200,
            noise: 6,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.spawn_chance),
            "spawn_chance must lie in [0, 1]"
        );
        ensure!(self.scroll_px > 0, "scroll_px must be positive");
        ensure!(
            self.obstacle_width_frac > 0.0 && self.obstacle_width_frac <= 1.0,
            "obstacle_width_frac must lie in (0, 1]"
        );
        ensure!(
            self.obstacle_height_frac > 0.0 && self.obstacle_height_frac <= 1.0,
            "obstacle_height_frac must lie in (0, 1]"
        );
        Ok(())
    }
}

const DAY_BACKGROUND: u8 = 247;
const DAY_FOREGROUND: u8 = 83;

/// Frame source that scrolls dark obstacles across a light lane, flipping
/// the palette periodically the way the real game does at night.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    frames: u64,
    obstacle_x: Option<i64>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            frames: 0,
            obstacle_x: None,
        }
    }

    pub fn is_night(&self) -> bool {
        self.config.invert_every > 0 && (self.frames / self.config.invert_every) % 2 == 1
    }

    fn advance(&mut self, width: u32, obstacle_width: u32) {
        self.obstacle_x = match self.obstacle_x {
            Some(x) if x + (obstacle_width as i64) > 0 => Some(x - self.config.scroll_px as i64),
            _ if self.rng.gen_bool(self.config.spawn_chance) => Some(width as i64),
            _ => None,
        };
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self, region: &Region) -> Result<Frame, CollaboratorError> {
        let width = region.width();
        let height = region.height();
        let obstacle_width = ((width as f64 * self.config.obstacle_width_frac).ceil() as u32).max(1);
        let obstacle_top =
            height - ((height as f64 * self.config.obstacle_height_frac).ceil() as u32).min(height);

        self.advance(width, obstacle_width);
        let night = self.is_night();
        self.frames += 1;

        let (background, foreground) = if night {
            (255 - DAY_BACKGROUND, 255 - DAY_FOREGROUND)
        } else {
            (DAY_BACKGROUND, DAY_FOREGROUND)
        };
        let obstacle = self.obstacle_x;
        let noise = self.config.noise as i16;
        let rng = &mut self.rng;

        Frame::from_fn(width, height, |x, y| {
            let inside = obstacle.map_or(false, |left| {
                let x = x as i64;
                x >= left && x < left + obstacle_width as i64 && y >= obstacle_top
            });
            let base = if inside { foreground } else { background };
            let jitter = if noise > 0 {
                rng.gen_range(-noise..=noise)
            } else {
                0
            };
            let level = (base as i16 + jitter).clamp(0, 255) as u8;
            [level, level, level]
        })
        .map_err(|err| CollaboratorError::Fatal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflexcore::processing::ObstacleClassifier;
    use reflexcore::VisualMode;

    fn region() -> Region {
        Region::new(0, 0, 100, 50).unwrap()
    }

    #[test]
    fn frames_match_region_size() {
        let mut source = SyntheticSource::new(SyntheticConfig::default());
        let frame = source.capture(&region()).unwrap();
        assert_eq!((frame.width(), frame.height()), (100, 50));
    }

    #[test]
    fn same_seed_replays_same_frames() {
        let mut a = SyntheticSource::new(SyntheticConfig::default());
        let mut b = SyntheticSource::new(SyntheticConfig::default());
        for _ in 0..50 {
            assert_eq!(a.capture(&region()).unwrap(), b.capture(&region()).unwrap());
        }
    }

    #[test]
    fn obstacles_scroll_through_and_get_detected() {
        let config = SyntheticConfig {
            spawn_chance: 1.0,
            scroll_px: 10,
            invert_every: 0,
            ..Default::default()
        };
        let mut source = SyntheticSource::new(config);
        let mut classifier = ObstacleClassifier::default();
        let detections = (0..30)
            .map(|_| source.capture(&region()).unwrap())
            .filter(|frame| classifier.classify(frame, 0.03).is_obstacle)
            .count();
        assert!(detections > 0);
        assert_eq!(classifier.mode(), VisualMode::Light);
    }

    #[test]
    fn palette_inverts_into_dark_mode() {
        let config = SyntheticConfig {
            spawn_chance: 0.0,
            invert_every: 5,
            ..Default::default()
        };
        let mut source = SyntheticSource::new(config);
        let mut classifier = ObstacleClassifier::default();
        for _ in 0..6 {
            let frame = source.capture(&region()).unwrap();
            let result = classifier.classify(&frame, 0.05);
            assert!(!result.is_obstacle);
        }
        assert_eq!(classifier.mode(), VisualMode::Dark);
    }

    #[test]
    fn validation_rejects_zero_scroll() {
        let config = SyntheticConfig {
            scroll_px: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
