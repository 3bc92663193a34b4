use anyhow::Context;
use image::{imageops, RgbaImage};
use reflexcore::prelude::{CollaboratorError, Frame, FrameSource, Region};
use xcap::Monitor;

/// Grabs the primary monitor and crops the calibrated region out of it.
pub struct ScreenSource {
    monitor: Monitor,
}

impl ScreenSource {
    /// Falls back to the first monitor when none reports itself as primary.
    pub fn primary() -> anyhow::Result<Self> {
        let monitors = Monitor::all().context("enumerating monitors")?;
        let index = monitors
            .iter()
            .position(|monitor| monitor.is_primary())
            .unwrap_or(0);
        let monitor = monitors
            .into_iter()
            .nth(index)
            .context("no monitors found")?;
        Ok(Self { monitor })
    }
}

impl FrameSource for ScreenSource {
    fn capture(&mut self, region: &Region) -> Result<Frame, CollaboratorError> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|err| CollaboratorError::Transient(format!("screen capture: {}", err)))?;
        let (width, height) = (shot.width(), shot.height());
        let shot = RgbaImage::from_raw(width, height, shot.into_raw()).ok_or_else(|| {
            CollaboratorError::Transient(format!("short screenshot buffer for {}x{}", width, height))
        })?;
        crop_region(&shot, region)
    }
}

/// Cuts `region` out of a screenshot. A region that does not fit the screen
/// will never fit on a retry, so it is fatal.
pub fn crop_region(shot: &RgbaImage, region: &Region) -> Result<Frame, CollaboratorError> {
    let (width, height) = shot.dimensions();
    if region.x2 > width || region.y2 > height {
        return Err(CollaboratorError::Fatal(format!(
            "region ({}, {}) ~ ({}, {}) exceeds screen {}x{}",
            region.x1, region.y1, region.x2, region.y2, width, height
        )));
    }

    let cropped =
        imageops::crop_imm(shot, region.x1, region.y1, region.width(), region.height()).to_image();
    Frame::from_rgba(cropped.width(), cropped.height(), cropped.as_raw())
        .map_err(|err| CollaboratorError::Fatal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 4x3 screen where each pixel encodes its own coordinates.
    fn screen() -> RgbaImage {
        RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8, y as u8, 9, 255]))
    }

    #[test]
    fn crop_picks_the_region() {
        let region = Region::new(1, 1, 3, 3).unwrap();
        let frame = crop_region(&screen(), &region).unwrap();
        assert_eq!((frame.width(), frame.height()), (2, 2));
        assert_eq!(frame.sample(0, 0), Some([1, 1, 9]));
        assert_eq!(frame.sample(1, 1), Some([2, 2, 9]));
    }

    #[test]
    fn region_touching_the_screen_edge_is_kept() {
        let region = Region::new(0, 0, 4, 3).unwrap();
        let frame = crop_region(&screen(), &region).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.sample(3, 2), Some([3, 2, 9]));
    }

    #[test]
    fn off_screen_region_is_fatal() {
        let region = Region::new(2, 0, 5, 2).unwrap();
        let err = crop_region(&screen(), &region).unwrap_err();
        assert!(!err.is_transient());
    }
}
