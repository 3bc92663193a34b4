use crate::devices::ActionKey;
use crate::generator::SyntheticConfig;
use anyhow::Context;
use reflexcore::control::{ControlConfig, LoopSettings};
use reflexcore::processing::{ClassifierConfig, SpeedConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the pilot reads and writes its files.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub roi_config: PathBuf,
    pub report: PathBuf,
    pub debug_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            roi_config: PathBuf::from("roi_config.json"),
            report: PathBuf::from("play_history.json"),
            debug_dir: PathBuf::from("debug_captures"),
        }
    }
}

/// Tunables file. Every section is optional; missing keys keep defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub classifier: ClassifierConfig,
    pub speed: SpeedConfig,
    pub control: ControlConfig,
    pub paths: PathsConfig,
    pub action_key: ActionKey,
    pub synthetic: SyntheticConfig,
    /// Stop the session on its own after this many seconds.
    pub session_limit_secs: Option<f64>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.to_loop_settings()
            .validate()
            .context("validating loop settings")?;
        self.synthetic
            .validate()
            .context("validating synthetic settings")?;
        if let Some(limit) = self.session_limit_secs {
            anyhow::ensure!(limit > 0.0, "session_limit_secs must be positive");
            self.session_limit()?;
        }
        Ok(())
    }

    pub fn session_limit(&self) -> anyhow::Result<Option<Duration>> {
        self.session_limit_secs
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("session_limit_secs is not a usable duration")
    }

    pub fn to_loop_settings(&self) -> LoopSettings {
        LoopSettings {
            classifier: self.classifier.clone(),
            speed: self.speed.clone(),
            control: self.control.clone(),
        }
    }
}
