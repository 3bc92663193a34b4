use crate::devices::{JsonResultStore, KeyboardSink, LoggingSink, ScreenSource};
use crate::generator::SyntheticSource;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use chrono::Local;
use log::{error, info};
use reflexcore::control::{ControlLoop, SessionOutcome};
use reflexcore::prelude::{ActionSink, FrameSource, Region};
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::watch;

/// Where frames come from and where actions go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Real screen capture and keyboard injection.
    Live,
    /// Generated frames and logged key presses.
    Synthetic,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Runs one session on a fresh current-thread runtime, stopping on Ctrl+C
    /// or the configured session limit.
    pub fn execute(&self, region: Region, backend: Backend) -> anyhow::Result<SessionOutcome> {
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the control loop")?;
        let limit = self.config.session_limit()?;
        runtime.block_on(async {
            let cancel = spawn_stop_signal(limit);
            self.run_session(region, backend, cancel).await
        })
    }

    pub async fn run_session(
        &self,
        region: Region,
        backend: Backend,
        cancel: watch::Receiver<bool>,
    ) -> anyhow::Result<SessionOutcome> {
        let store = JsonResultStore::create(
            &self.config.paths.report,
            &self.config.paths.debug_dir,
            Local::now(),
        )
        .context("preparing result store")?;

        match backend {
            Backend::Live => {
                let source = ScreenSource::primary().context("opening screen capture")?;
                let sink = KeyboardSink::new(self.config.action_key);
                self.drive(region, source, sink, store, cancel).await
            }
            Backend::Synthetic => {
                let source = SyntheticSource::new(self.config.synthetic.clone());
                self.drive(region, source, LoggingSink::default(), store, cancel)
                    .await
            }
        }
    }

    async fn drive<F, A>(
        &self,
        region: Region,
        source: F,
        sink: A,
        store: JsonResultStore,
        cancel: watch::Receiver<bool>,
    ) -> anyhow::Result<SessionOutcome>
    where
        F: FrameSource,
        A: ActionSink,
    {
        let mut control = ControlLoop::new(
            region,
            source,
            sink,
            store,
            self.config.to_loop_settings(),
        )
        .context("building control loop")?;
        control.run(cancel).await.context("running control loop")
    }
}

/// Flips the returned receiver on Ctrl+C or when `limit` elapses.
fn spawn_stop_signal(limit: Option<Duration>) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let deadline = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            interrupted = signal::ctrl_c() => match interrupted {
                Ok(()) => info!("interrupted by user, stopping"),
                Err(err) => error!("listening for Ctrl+C failed, stopping: {}", err),
            },
            _ = deadline => info!("session limit reached, stopping"),
        }
        let _ = tx.send(true);
    });
    rx
}
