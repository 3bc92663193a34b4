use crate::interface::SessionReport;
use crate::prelude::{
    ActionSink, Clock, CollaboratorError, DetectionResult, Frame, FrameSource, LoopError,
    LoopResult, Region, ResultStore, SystemClock,
};
use crate::processing::{ClassifierConfig, ObstacleClassifier, SpeedConfig, SpeedModel};
use crate::telemetry::{SessionStats, StatusReporter};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Loop-level tunables that are not speed-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub status_cadence_secs: f64,
    /// Consecutive transient failures of one collaborator before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            status_cadence_secs: 10.0,
            max_consecutive_failures: 25,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> LoopResult<()> {
        if self.max_consecutive_failures == 0 {
            return Err(LoopError::InvalidConfiguration(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        if !self.status_cadence_secs.is_finite() || self.status_cadence_secs < 0.0 {
            return Err(LoopError::InvalidConfiguration(
                "status_cadence_secs must be a non-negative number".into(),
            ));
        }
        Duration::try_from_secs_f64(self.status_cadence_secs).map_err(|err| {
            LoopError::InvalidConfiguration(format!(
                "status_cadence_secs = {}: {}",
                self.status_cadence_secs, err
            ))
        })?;
        Ok(())
    }
}

/// Everything the loop needs besides its collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub classifier: ClassifierConfig,
    pub speed: SpeedConfig,
    pub control: ControlConfig,
}

impl LoopSettings {
    pub fn validate(&self) -> LoopResult<()> {
        self.classifier.validate()?;
        self.speed.validate()?;
        self.control.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    CollaboratorFailure(String),
}

/// What a finished session hands back to its caller.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub report: SessionReport,
    pub stop_reason: StopReason,
    pub final_speed_factor: f64,
    pub capture_failures: usize,
    pub action_failures: usize,
}

enum Step {
    Continue,
    Stop(StopReason),
}

struct FailureBudget {
    limit: u32,
    capture_streak: u32,
    action_streak: u32,
}

impl FailureBudget {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            capture_streak: 0,
            action_streak: 0,
        }
    }

    fn capture_failed(&mut self, err: &CollaboratorError) -> Option<StopReason> {
        Self::charge(&mut self.capture_streak, self.limit, "frame capture", err)
    }

    fn action_failed(&mut self, err: &CollaboratorError) -> Option<StopReason> {
        Self::charge(&mut self.action_streak, self.limit, "action", err)
    }

    fn charge(
        streak: &mut u32,
        limit: u32,
        what: &str,
        err: &CollaboratorError,
    ) -> Option<StopReason> {
        if !err.is_transient() {
            return Some(StopReason::CollaboratorFailure(format!(
                "{} failed: {}",
                what, err
            )));
        }
        *streak += 1;
        if *streak >= limit {
            return Some(StopReason::CollaboratorFailure(format!(
                "{} failed {} times in a row; last error: {}",
                what, streak, err
            )));
        }
        None
    }
}

fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    cancel.has_changed().is_err() || *cancel.borrow()
}

/// Sleeps for `duration` unless cancellation arrives first. A dropped sender
/// counts as cancellation. Returns true when cancelled.
async fn suspend(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if cancelled(cancel) {
        return true;
    }
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return false,
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow_and_update() {
                    return true;
                }
            }
        }
    }
}

/// Capture → classify → act loop paced by the speed model.
///
/// One instance drives exactly one session: IDLE → RUNNING → STOPPED, and the
/// session report is flushed once on the way into STOPPED.
pub struct ControlLoop<F, A, S, C = SystemClock> {
    region: Region,
    source: F,
    sink: A,
    store: S,
    clock: C,
    classifier: ObstacleClassifier,
    speed: SpeedModel,
    status: StatusReporter,
    control: ControlConfig,
    state: LoopState,
}

impl<F, A, S> ControlLoop<F, A, S, SystemClock>
where
    F: FrameSource,
    A: ActionSink,
    S: ResultStore,
{
    pub fn new(
        region: Region,
        source: F,
        sink: A,
        store: S,
        settings: LoopSettings,
    ) -> LoopResult<Self> {
        region.validate()?;
        settings.validate()?;
        Ok(Self {
            region,
            source,
            sink,
            store,
            clock: SystemClock,
            classifier: ObstacleClassifier::new(settings.classifier),
            speed: SpeedModel::new(settings.speed),
            status: StatusReporter::new(Duration::from_secs_f64(
                settings.control.status_cadence_secs,
            )),
            control: settings.control,
            state: LoopState::Idle,
        })
    }
}

impl<F, A, S, C> ControlLoop<F, A, S, C>
where
    F: FrameSource,
    A: ActionSink,
    S: ResultStore,
    C: Clock,
{
    pub fn with_clock<K: Clock>(self, clock: K) -> ControlLoop<F, A, S, K> {
        ControlLoop {
            region: self.region,
            source: self.source,
            sink: self.sink,
            store: self.store,
            clock,
            classifier: self.classifier,
            speed: self.speed,
            status: self.status,
            control: self.control,
            state: self.state,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn classifier(&self) -> &ObstacleClassifier {
        &self.classifier
    }

    pub fn speed(&self) -> &SpeedModel {
        &self.speed
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the session until `cancel` turns true (or its sender is dropped)
    /// or a collaborator fails for good.
    pub async fn run(&mut self, mut cancel: watch::Receiver<bool>) -> LoopResult<SessionOutcome> {
        if self.state != LoopState::Idle {
            return Err(LoopError::InvalidState(format!(
                "run requires an idle loop, current state is {:?}",
                self.state
            )));
        }

        let start = self.clock.now();
        self.speed.start(start);
        self.classifier.reset();
        let mut stats = SessionStats::begin(self.clock.wall(), self.region);
        let mut failures = FailureBudget::new(self.control.max_consecutive_failures);
        self.state = LoopState::Running;
        info!(
            "session started on region ({}, {}) ~ ({}, {})",
            self.region.x1, self.region.y1, self.region.x2, self.region.y2
        );

        let stop_reason = loop {
            if cancelled(&cancel) {
                break StopReason::Cancelled;
            }
            match self.iterate(&mut stats, &mut failures, &mut cancel).await {
                Step::Continue => {}
                Step::Stop(reason) => break reason,
            }
        };

        self.finish(start, &stats, stop_reason)
    }

    async fn iterate(
        &mut self,
        stats: &mut SessionStats,
        failures: &mut FailureBudget,
        cancel: &mut watch::Receiver<bool>,
    ) -> Step {
        let now = self.clock.now();
        let params = self.speed.parameters(now);
        self.status
            .observe(now, &params, self.classifier.mode(), stats.action_count());

        match self.source.capture(&self.region) {
            Ok(frame) => {
                failures.capture_streak = 0;
                let detection = self.classifier.classify(&frame, params.ratio_threshold);
                if detection.is_obstacle {
                    match self.act(&frame, &detection, stats, failures) {
                        Ok(true) => {
                            if suspend(params.cooldown, cancel).await {
                                return Step::Stop(StopReason::Cancelled);
                            }
                        }
                        Ok(false) => {}
                        Err(reason) => return Step::Stop(reason),
                    }
                }
            }
            Err(err) => {
                stats.record_capture_failure();
                if let Some(reason) = failures.capture_failed(&err) {
                    return Step::Stop(reason);
                }
                warn!("frame capture failed, skipping iteration: {}", err);
            }
        }

        if suspend(params.poll_interval, cancel).await {
            Step::Stop(StopReason::Cancelled)
        } else {
            Step::Continue
        }
    }

    /// Fires the action for a positive detection. `Ok(true)` means the action
    /// happened and the cooldown applies.
    fn act(
        &mut self,
        frame: &Frame,
        detection: &DetectionResult,
        stats: &mut SessionStats,
        failures: &mut FailureBudget,
    ) -> Result<bool, StopReason> {
        if let Err(err) = self.sink.activate() {
            stats.record_action_failure();
            if let Some(reason) = failures.action_failed(&err) {
                return Err(reason);
            }
            warn!("action failed, jump not counted: {}", err);
            return Ok(false);
        }
        failures.action_streak = 0;

        let sequence = stats.record_action();
        info!(
            "jump #{} | brightness {:.1} | detect {:.1}% | mode {}",
            sequence,
            detection.avg_brightness,
            detection.detect_ratio * 100.0,
            detection.mode
        );
        match self.store.persist_artifact(frame, sequence, self.clock.wall()) {
            Ok(path) => {
                stats.record_artifact();
                info!("  debug image saved: {}", path.display());
            }
            Err(err) => warn!("  debug image for jump #{} not saved: {}", sequence, err),
        }
        Ok(true)
    }

    fn finish(
        &mut self,
        start: Instant,
        stats: &SessionStats,
        stop_reason: StopReason,
    ) -> LoopResult<SessionOutcome> {
        self.state = LoopState::Stopped;
        let now = self.clock.now();
        let final_speed_factor = self.speed.speed_factor(now);
        let report = stats.finish(now.saturating_duration_since(start));

        match &stop_reason {
            StopReason::Cancelled => info!(
                "session stopped after {:.2}s: {} jumps, {} debug images, final speed x{:.2}",
                report.total_play_time_seconds,
                report.jump_count,
                report.debug_image_count,
                final_speed_factor
            ),
            StopReason::CollaboratorFailure(message) => {
                error!("session stopped by collaborator failure: {}", message)
            }
        }

        self.store
            .append_report(&report)
            .map_err(|err| LoopError::Store(err.to_string()))?;

        let (capture_failures, action_failures) = stats.failure_counts();
        Ok(SessionOutcome {
            report,
            stop_reason,
            final_speed_factor,
            capture_failures,
            action_failures,
        })
    }
}
