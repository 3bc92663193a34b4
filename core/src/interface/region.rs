use crate::prelude::{LoopError, LoopResult, Region};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Region record written by calibration and loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub roi: Region,
    pub width: u32,
    pub height: u32,
}

impl RegionConfig {
    pub fn new(roi: Region) -> Self {
        Self {
            width: roi.width(),
            height: roi.height(),
            roi,
        }
    }

    pub fn from_json(contents: &str) -> LoopResult<Self> {
        let config: RegionConfig = serde_json::from_str(contents)
            .map_err(|err| LoopError::InvalidConfiguration(format!("region config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> LoopResult<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| match err.kind() {
            ErrorKind::NotFound => LoopError::ConfigurationMissing(format!(
                "{} not found; run calibration first to select the capture region",
                path_ref.display()
            )),
            _ => LoopError::ConfigurationMissing(format!(
                "reading {}: {}",
                path_ref.display(),
                err
            )),
        })?;
        Self::from_json(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> LoopResult<()> {
        let path_ref = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| LoopError::InvalidConfiguration(err.to_string()))?;
        fs::write(path_ref, json).map_err(|err| {
            LoopError::Store(format!("writing {}: {}", path_ref.display(), err))
        })
    }

    pub fn validate(&self) -> LoopResult<()> {
        self.roi.validate()?;
        if self.width != self.roi.width() || self.height != self.roi.height() {
            return Err(LoopError::InvalidConfiguration(format!(
                "declared size {}x{} does not match region {}x{}",
                self.width,
                self.height,
                self.roi.width(),
                self.roi.height()
            )));
        }
        Ok(())
    }
}
