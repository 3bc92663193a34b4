use crate::interface::SessionReport;
use crate::prelude::Region;
use chrono::{DateTime, Local};
use std::time::Duration;

/// Counters accumulated over one session, owned by the control loop.
#[derive(Debug, Clone)]
pub struct SessionStats {
    started_at: DateTime<Local>,
    region: Region,
    actions: usize,
    artifacts: usize,
    capture_failures: usize,
    action_failures: usize,
}

impl SessionStats {
    pub fn begin(started_at: DateTime<Local>, region: Region) -> Self {
        Self {
            started_at,
            region,
            actions: 0,
            artifacts: 0,
            capture_failures: 0,
            action_failures: 0,
        }
    }

    /// Returns the new action count, which doubles as the artifact sequence.
    pub fn record_action(&mut self) -> usize {
        self.actions += 1;
        self.actions
    }

    pub fn record_artifact(&mut self) {
        self.artifacts += 1;
    }

    pub fn record_capture_failure(&mut self) {
        self.capture_failures += 1;
    }

    pub fn record_action_failure(&mut self) {
        self.action_failures += 1;
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn action_count(&self) -> usize {
        self.actions
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts
    }

    pub fn failure_counts(&self) -> (usize, usize) {
        (self.capture_failures, self.action_failures)
    }

    pub fn finish(&self, elapsed: Duration) -> SessionReport {
        SessionReport {
            play_start_time: self.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            total_play_time_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
            jump_count: self.actions,
            debug_image_count: self.artifacts,
            roi: self.region,
        }
    }
}
