use crate::interface::SessionReport;
use crate::math::stats::StatsHelper;
use chrono::{DateTime, Local};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::time::Instant;

/// Screen rectangle monitored every iteration. Edges are exclusive on the
/// right/bottom, matching how captures are cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Region {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> LoopResult<Self> {
        let region = Self { x1, y1, x2, y2 };
        region.validate()?;
        Ok(region)
    }

    /// Builds a region from two arbitrary corners, normalizing their order.
    pub fn from_corners(a: (u32, u32), b: (u32, u32)) -> LoopResult<Self> {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    pub fn validate(&self) -> LoopResult<()> {
        if self.x1 >= self.x2 || self.y1 >= self.y2 {
            return Err(LoopError::InvalidConfiguration(format!(
                "region ({}, {}) ~ ({}, {}) must satisfy x1 < x2 and y1 < y2",
                self.x1, self.y1, self.x2, self.y2
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Pixel contents of the region at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Array2<[u8; 3]>,
}

impl Frame {
    pub fn from_rgb(width: u32, height: u32, bytes: &[u8]) -> LoopResult<Self> {
        Self::from_channels(width, height, bytes, 3)
    }

    /// Alpha is dropped; screen grabbers usually hand back RGBA.
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> LoopResult<Self> {
        Self::from_channels(width, height, bytes, 4)
    }

    pub fn from_fn<F>(width: u32, height: u32, mut pixel: F) -> LoopResult<Self>
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        if width == 0 || height == 0 {
            return Err(LoopError::InvalidFrame("frame has no samples".into()));
        }
        let samples = Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
            pixel(col as u32, row as u32)
        });
        Ok(Self { samples })
    }

    fn from_channels(width: u32, height: u32, bytes: &[u8], channels: usize) -> LoopResult<Self> {
        if width == 0 || height == 0 {
            return Err(LoopError::InvalidFrame("frame has no samples".into()));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(channels))
            .ok_or_else(|| LoopError::InvalidFrame("frame dimensions overflow".into()))?;
        if bytes.len() != expected {
            return Err(LoopError::InvalidFrame(format!(
                "expected {} bytes for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                bytes.len()
            )));
        }

        let pixels = bytes
            .chunks_exact(channels)
            .map(|px| [px[0], px[1], px[2]])
            .collect::<Vec<_>>();
        let samples = Array2::from_shape_vec((height as usize, width as usize), pixels)
            .map_err(|err| LoopError::InvalidFrame(err.to_string()))?;
        Ok(Self { samples })
    }

    pub fn width(&self) -> u32 {
        self.samples.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.samples.nrows() as u32
    }

    pub fn sample(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.samples.get((y as usize, x as usize)).copied()
    }

    pub fn samples(&self) -> &Array2<[u8; 3]> {
        &self.samples
    }

    /// Gray-level view of the frame.
    pub fn luminance(&self) -> Array2<u8> {
        self.samples.mapv(StatsHelper::luminance)
    }
}

/// Which pixel polarity currently represents the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VisualMode {
    #[default]
    Light,
    Dark,
}

impl std::fmt::Display for VisualMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisualMode::Light => write!(f, "LIGHT"),
            VisualMode::Dark => write!(f, "DARK"),
        }
    }
}

/// Outcome of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    pub is_obstacle: bool,
    pub avg_brightness: f64,
    pub detect_ratio: f64,
    pub dark_ratio: f64,
    pub mode: VisualMode,
}

/// Common error type for the loop and its configuration.
#[derive(thiserror::Error, Debug)]
pub enum LoopError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("result store failure: {0}")]
    Store(String),
}

pub type LoopResult<T> = Result<T, LoopError>;

/// Failure reported by an external collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Worth retrying on the next iteration (capture timing glitch, busy device).
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CollaboratorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Transient(_))
    }
}

/// Supplies the current pixels of a region.
pub trait FrameSource {
    fn capture(&mut self, region: &Region) -> Result<Frame, CollaboratorError>;
}

/// Performs the single discrete action (a key press).
pub trait ActionSink {
    fn activate(&mut self) -> Result<(), CollaboratorError>;
}

/// Durable storage for debug artifacts and session reports.
pub trait ResultStore {
    fn persist_artifact(
        &mut self,
        frame: &Frame,
        sequence: usize,
        captured_at: DateTime<Local>,
    ) -> Result<PathBuf, CollaboratorError>;

    fn append_report(&mut self, report: &SessionReport) -> Result<(), CollaboratorError>;
}

/// Time source for the loop. Monotonic time drives pacing; wall time only
/// labels reports and artifacts.
pub trait Clock {
    fn now(&self) -> Instant;
    fn wall(&self) -> DateTime<Local>;
}

/// Tokio's clock, so paused test runtimes drive the loop on virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_rejects_inverted_corners() {
        assert!(Region::new(10, 0, 5, 20).is_err());
        assert!(Region::new(0, 0, 0, 20).is_err());
        let region = Region::from_corners((100, 50), (0, 0)).unwrap();
        assert_eq!(region, Region { x1: 0, y1: 0, x2: 100, y2: 50 });
        assert_eq!((region.width(), region.height()), (100, 50));
    }

    #[test]
    fn frame_from_rgba_drops_alpha() {
        let bytes = [10, 20, 30, 255, 40, 50, 60, 0];
        let frame = Frame::from_rgba(2, 1, &bytes).unwrap();
        assert_eq!(frame.sample(0, 0), Some([10, 20, 30]));
        assert_eq!(frame.sample(1, 0), Some([40, 50, 60]));
        assert_eq!(frame.sample(2, 0), None);
    }

    #[test]
    fn frame_rejects_empty_or_short_buffers() {
        assert!(matches!(
            Frame::from_rgb(0, 4, &[]),
            Err(LoopError::InvalidFrame(_))
        ));
        assert!(matches!(
            Frame::from_rgb(2, 2, &[0; 11]),
            Err(LoopError::InvalidFrame(_))
        ));
    }

    #[test]
    fn frame_from_fn_indexes_columns_then_rows() {
        let frame = Frame::from_fn(3, 2, |x, y| [x as u8, y as u8, 0]).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sample(2, 1), Some([2, 1, 0]));
    }
}
