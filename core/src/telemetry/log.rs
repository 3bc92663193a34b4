use crate::prelude::VisualMode;
use crate::processing::SpeedParameters;
use log::info;
use std::time::Duration;
use tokio::time::Instant;

/// Shortest gap allowed between two status lines.
pub const MIN_STATUS_CADENCE: Duration = Duration::from_secs(10);

/// Rate-limited status line for the running loop. Purely observational.
pub struct StatusReporter {
    cadence: Duration,
    last_emitted: Option<Instant>,
}

impl StatusReporter {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence: cadence.max(MIN_STATUS_CADENCE),
            last_emitted: None,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    /// Emits a status line when the cadence has elapsed; returns whether it did.
    pub fn observe(
        &mut self,
        now: Instant,
        params: &SpeedParameters,
        mode: VisualMode,
        actions: usize,
    ) -> bool {
        let due = match self.last_emitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cadence,
        };
        if !due {
            return false;
        }
        self.last_emitted = Some(now);
        self.record(&format!(
            "speed x{:.2} | mode {} | interval {:.1}ms | cooldown {:.1}ms | ratio > {:.2}% | jumps {}",
            params.factor,
            mode,
            params.poll_interval.as_secs_f64() * 1000.0,
            params.cooldown.as_secs_f64() * 1000.0,
            params.ratio_threshold * 100.0,
            actions
        ));
        true
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(MIN_STATUS_CADENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SpeedParameters {
        SpeedParameters {
            factor: 1.0,
            poll_interval: Duration::from_millis(50),
            cooldown: Duration::from_millis(300),
            ratio_threshold: 0.05,
        }
    }

    #[test]
    fn emits_at_most_once_per_cadence() {
        let mut reporter = StatusReporter::default();
        let t0 = Instant::now();
        assert!(reporter.observe(t0, &params(), VisualMode::Light, 0));
        assert!(!reporter.observe(t0 + Duration::from_secs(9), &params(), VisualMode::Light, 0));
        assert!(reporter.observe(t0 + Duration::from_secs(10), &params(), VisualMode::Dark, 3));
    }

    #[test]
    fn cadence_never_drops_below_ten_seconds() {
        assert_eq!(
            StatusReporter::new(Duration::from_secs(1)).cadence(),
            MIN_STATUS_CADENCE
        );
        assert_eq!(
            StatusReporter::new(Duration::from_secs(30)).cadence(),
            Duration::from_secs(30)
        );
    }
}
