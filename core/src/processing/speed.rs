use crate::prelude::{LoopError, LoopResult};
use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Tunables for the session speed ramp and the parameters derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub base_interval_secs: f64,
    pub base_cooldown_secs: f64,
    pub base_ratio: f64,
    pub min_ratio: f64,
    pub max_speed_factor: f64,
    pub ramp_duration_secs: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: 0.05,
            base_cooldown_secs: 0.3,
            base_ratio: 0.05,
            min_ratio: 0.03,
            max_speed_factor: 2.17,
            ramp_duration_secs: 180.0,
        }
    }
}

impl SpeedConfig {
    pub fn validate(&self) -> LoopResult<()> {
        let values = [
            self.base_interval_secs,
            self.base_cooldown_secs,
            self.base_ratio,
            self.min_ratio,
            self.max_speed_factor,
            self.ramp_duration_secs,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LoopError::InvalidConfiguration(
                "speed settings must be finite numbers".into(),
            ));
        }
        if self.max_speed_factor <= 1.0 {
            return Err(LoopError::InvalidConfiguration(format!(
                "max_speed_factor must exceed 1.0, got {}",
                self.max_speed_factor
            )));
        }
        if self.ramp_duration_secs <= 0.0 {
            return Err(LoopError::InvalidConfiguration(
                "ramp_duration_secs must be positive".into(),
            ));
        }
        if self.base_interval_secs <= 0.0 || self.base_cooldown_secs <= 0.0 {
            return Err(LoopError::InvalidConfiguration(
                "base interval and cooldown must be positive".into(),
            ));
        }
        for (name, secs) in [
            ("base_interval_secs", self.base_interval_secs),
            ("base_cooldown_secs", self.base_cooldown_secs),
        ] {
            Duration::try_from_secs_f64(secs).map_err(|err| {
                LoopError::InvalidConfiguration(format!("{} = {}: {}", name, secs, err))
            })?;
        }
        if self.min_ratio < 0.0 || self.min_ratio > self.base_ratio || self.base_ratio > 1.0 {
            return Err(LoopError::InvalidConfiguration(format!(
                "ratios must satisfy 0 <= min_ratio ({}) <= base_ratio ({}) <= 1",
                self.min_ratio, self.base_ratio
            )));
        }
        Ok(())
    }
}

/// Every speed-derived value for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedParameters {
    pub factor: f64,
    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub ratio_threshold: f64,
}

/// Maps session-elapsed time onto a concave speed ramp capped at
/// `max_speed_factor`.
#[derive(Debug, Clone)]
pub struct SpeedModel {
    config: SpeedConfig,
    start_time: Option<Instant>,
}

impl SpeedModel {
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            start_time: None,
        }
    }

    pub fn config(&self) -> &SpeedConfig {
        &self.config
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// Records the session start. A second call resets the ramp baseline.
    pub fn start(&mut self, now: Instant) {
        if self.start_time.is_some() {
            warn!("speed model restarted mid-session; elapsed-time baseline reset");
        }
        self.start_time = Some(now);
    }

    pub fn speed_factor(&self, now: Instant) -> f64 {
        let Some(start) = self.start_time else {
            return 1.0;
        };
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        if elapsed >= self.config.ramp_duration_secs {
            return self.config.max_speed_factor;
        }
        let progress = elapsed / self.config.ramp_duration_secs;
        1.0 + (self.config.max_speed_factor - 1.0) * (1.0 + 2.0 * progress).ln() / 3f64.ln()
    }

    pub fn poll_interval(&self, now: Instant) -> Duration {
        self.interval_for(self.speed_factor(now))
    }

    pub fn action_cooldown(&self, now: Instant) -> Duration {
        self.cooldown_for(self.speed_factor(now))
    }

    pub fn detect_ratio_threshold(&self, now: Instant) -> f64 {
        self.ratio_for(self.speed_factor(now))
    }

    /// All derived values from a single `now`.
    pub fn parameters(&self, now: Instant) -> SpeedParameters {
        let factor = self.speed_factor(now);
        SpeedParameters {
            factor,
            poll_interval: self.interval_for(factor),
            cooldown: self.cooldown_for(factor),
            ratio_threshold: self.ratio_for(factor),
        }
    }

    fn interval_for(&self, factor: f64) -> Duration {
        Duration::from_secs_f64(self.config.base_interval_secs / factor)
    }

    fn cooldown_for(&self, factor: f64) -> Duration {
        Duration::from_secs_f64(self.config.base_cooldown_secs / factor)
    }

    fn ratio_for(&self, factor: f64) -> f64 {
        let cfg = &self.config;
        let span = (factor - 1.0) / (cfg.max_speed_factor - 1.0);
        let ratio = cfg.base_ratio - (cfg.base_ratio - cfg.min_ratio) * span;
        ratio.clamp(cfg.min_ratio, cfg.base_ratio)
    }
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self::new(SpeedConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> (SpeedModel, Instant) {
        let mut model = SpeedModel::default();
        let t0 = Instant::now();
        model.start(t0);
        (model, t0)
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[test]
    fn unstarted_model_runs_at_base_speed() {
        let model = SpeedModel::default();
        let now = Instant::now();
        assert_eq!(model.speed_factor(now), 1.0);
        assert_eq!(model.poll_interval(now), secs(0.05));
        assert_eq!(model.detect_ratio_threshold(now), 0.05);
    }

    #[test]
    fn factor_hits_both_ends_of_the_ramp() {
        let (model, t0) = started();
        assert_eq!(model.speed_factor(t0), 1.0);
        let at_ramp = model.speed_factor(t0 + secs(180.0));
        assert!((at_ramp - 2.17).abs() < 1e-9);
        assert_eq!(model.speed_factor(t0 + secs(190.0)), 2.17);
        assert_eq!(model.speed_factor(t0 + secs(10_000.0)), 2.17);
    }

    #[test]
    fn factor_is_concave_and_non_decreasing() {
        let (model, t0) = started();
        let samples: Vec<f64> = (0..=180)
            .map(|s| model.speed_factor(t0 + secs(s as f64)))
            .collect();
        assert!(samples.windows(2).all(|w| w[1] >= w[0]));
        let early_gain = samples[30] - samples[0];
        let late_gain = samples[180] - samples[150];
        assert!(early_gain > late_gain);
    }

    #[test]
    fn midpoint_matches_log_ramp() {
        let (model, t0) = started();
        let expected = 1.0 + 1.17 * 2f64.ln() / 3f64.ln();
        assert!((model.speed_factor(t0 + secs(90.0)) - expected).abs() < 1e-9);
    }

    #[test]
    fn derived_parameters_strictly_decrease_with_speed() {
        let (model, t0) = started();
        let points: Vec<SpeedParameters> = [0.0, 30.0, 60.0, 120.0, 180.0]
            .iter()
            .map(|&s| model.parameters(t0 + secs(s)))
            .collect();
        for pair in points.windows(2) {
            assert!(pair[1].factor > pair[0].factor);
            assert!(pair[1].poll_interval < pair[0].poll_interval);
            assert!(pair[1].cooldown < pair[0].cooldown);
            assert!(pair[1].ratio_threshold < pair[0].ratio_threshold);
        }
        assert_eq!(points[0].ratio_threshold, 0.05);
        assert!((points[4].ratio_threshold - 0.03).abs() < 1e-12);
    }

    #[test]
    fn ratio_threshold_is_clamped_to_configured_band() {
        let (model, t0) = started();
        let late = model.detect_ratio_threshold(t0 + secs(500.0));
        assert!(late >= 0.03 && late <= 0.05);
        assert_eq!(model.ratio_for(2.5), 0.03);
        assert_eq!(model.ratio_for(0.9), 0.05);
    }

    #[test]
    fn parameters_agree_with_individual_queries() {
        let (model, t0) = started();
        let now = t0 + secs(42.0);
        let params = model.parameters(now);
        assert_eq!(params.factor, model.speed_factor(now));
        assert_eq!(params.poll_interval, model.poll_interval(now));
        assert_eq!(params.cooldown, model.action_cooldown(now));
        assert_eq!(params.ratio_threshold, model.detect_ratio_threshold(now));
    }

    #[test]
    fn restart_moves_the_baseline() {
        let (mut model, t0) = started();
        let later = t0 + secs(120.0);
        model.start(later);
        assert_eq!(model.speed_factor(later), 1.0);
        assert_eq!(model.start_time(), Some(later));
    }

    #[test]
    fn config_validation_catches_bad_values() {
        assert!(SpeedConfig::default().validate().is_ok());
        let flat = SpeedConfig {
            max_speed_factor: 1.0,
            ..Default::default()
        };
        assert!(flat.validate().is_err());
        let inverted = SpeedConfig {
            min_ratio: 0.1,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let endless = SpeedConfig {
            base_cooldown_secs: 1e20,
            ..Default::default()
        };
        assert!(matches!(
            endless.validate(),
            Err(LoopError::InvalidConfiguration(_))
        ));
    }
}
