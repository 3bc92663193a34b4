use log::{info, warn};
use rdev::{simulate, EventType, Key, SimulateError};
use reflexcore::prelude::{ActionSink, CollaboratorError};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Key pressed on every detected obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    #[default]
    Space,
    Up,
}

impl ActionKey {
    fn key(self) -> Key {
        match self {
            ActionKey::Space => Key::Space,
            ActionKey::Up => Key::UpArrow,
        }
    }
}

type Injector = fn(&EventType) -> Result<(), SimulateError>;

/// Injects a real key press through the OS input queue.
///
/// The press is sent inline so its failure reaches the loop. The release
/// follows on a short-lived thread after `settle`, which keeps the runtime
/// thread free while the key is held.
pub struct KeyboardSink {
    key: ActionKey,
    settle: Duration,
    inject: Injector,
}

impl KeyboardSink {
    pub fn new(key: ActionKey) -> Self {
        // Some platforms drop events sent back to back.
        Self::with_injector(key, Duration::from_millis(15), simulate)
    }

    fn with_injector(key: ActionKey, settle: Duration, inject: Injector) -> Self {
        Self {
            key,
            settle,
            inject,
        }
    }
}

impl ActionSink for KeyboardSink {
    fn activate(&mut self) -> Result<(), CollaboratorError> {
        let key = self.key.key();
        let press = EventType::KeyPress(key);
        (self.inject)(&press).map_err(|err| {
            CollaboratorError::Transient(format!("simulating {:?}: {:?}", press, err))
        })?;

        let (inject, settle) = (self.inject, self.settle);
        thread::spawn(move || {
            thread::sleep(settle);
            let release = EventType::KeyRelease(key);
            if let Err(err) = inject(&release) {
                warn!("simulating {:?}: {:?}", release, err);
            }
        });
        Ok(())
    }
}

/// Stand-in for synthetic runs: logs the action instead of sending it.
#[derive(Debug, Default)]
pub struct LoggingSink {
    presses: usize,
}

impl LoggingSink {
    #[cfg(test)]
    pub fn presses(&self) -> usize {
        self.presses
    }
}

impl ActionSink for LoggingSink {
    fn activate(&mut self) -> Result<(), CollaboratorError> {
        self.presses += 1;
        info!("[synthetic] key press #{}", self.presses);
        Ok(())
    }
}
