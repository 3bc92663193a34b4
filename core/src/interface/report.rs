use crate::prelude::{LoopError, LoopResult, Region};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Summary of one play session, appended to the history file at STOPPED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub play_start_time: String,
    pub total_play_time_seconds: f64,
    pub jump_count: usize,
    pub debug_image_count: usize,
    pub roi: Region,
}

/// The on-disk history document. Entries and unrelated top-level keys are
/// kept as raw JSON so rewriting the file never drops what earlier runs or
/// other tools stored there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayHistory {
    #[serde(default)]
    pub play_history: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayHistory {
    pub fn from_json(contents: &str) -> LoopResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(contents)
            .map_err(|err| LoopError::Store(format!("parsing play history: {}", err)))
    }

    pub fn append(&mut self, report: &SessionReport) -> LoopResult<()> {
        let entry = serde_json::to_value(report)
            .map_err(|err| LoopError::Store(format!("encoding session report: {}", err)))?;
        self.play_history.push(entry);
        Ok(())
    }

    pub fn to_json_pretty(&self) -> LoopResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| LoopError::Store(format!("encoding play history: {}", err)))
    }

    pub fn len(&self) -> usize {
        self.play_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.play_history.is_empty()
    }
}
