use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use common::{EngineCommand, EngineState, SignalStats};

use crate::pipeline::{Pipeline, TickReport};

/// Wait before retrying after a tick in which every pair failed.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);
/// How long `EngineHandle::stop` waits for the loop to acknowledge.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Cloneable handle passed to the Telegram bridge and the binary.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    stats: Arc<SignalStats>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Shared state cell, for read-only observers such as `/status`.
    pub fn state_cell(&self) -> Arc<RwLock<EngineState>> {
        self.state.clone()
    }

    pub fn stats(&self) -> Arc<SignalStats> {
        self.stats.clone()
    }

    /// Ask the loop to stop and wait up to `STOP_GRACE` for it to settle.
    /// An in-flight tick is allowed to finish. Returns whether the engine
    /// reached the Stopped state in time.
    pub async fn stop(&self) -> bool {
        self.send(EngineCommand::Stop).await;
        let settled = tokio::time::timeout(STOP_GRACE, self.wait_stopped()).await;
        if settled.is_err() {
            warn!("Engine did not stop within the grace period");
        }
        settled.is_ok()
    }

    /// Resolve once the loop reports Stopped, however long the current tick takes.
    pub async fn wait_stopped(&self) {
        while self.state().await != EngineState::Stopped {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// The scheduler: a two-state machine driving `Pipeline::tick` on a fixed
/// interval while running.
pub struct Engine {
    pipeline: Pipeline,
    interval: Duration,
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    pub fn new(pipeline: Pipeline, interval: Duration) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            stats: pipeline.stats(),
        };

        let engine = Engine {
            pipeline,
            interval,
            state,
            command_rx,
        };

        (engine, handle)
    }

    /// One analysis pass, outside the timer. The loop calls this on every tick.
    pub async fn tick(&mut self) -> TickReport {
        self.pipeline.tick(Utc::now()).await
    }

    fn ticker(&self, first: Instant) -> Interval {
        let mut ticker = interval_at(first, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Run the engine until every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Engine initialized in Stopped state. Waiting for Start command.");

        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::Start) => {
                        if ticker.is_some() {
                            info!("Engine already running");
                            continue;
                        }
                        info!(interval_secs = self.interval.as_secs(), "Starting analysis loop");
                        *self.state.write().await = EngineState::Running;
                        ticker = Some(self.ticker(Instant::now()));
                    }
                    Some(EngineCommand::Stop) => {
                        if ticker.take().is_some() {
                            info!("Analysis loop stopped");
                        }
                        *self.state.write().await = EngineState::Stopped;
                    }
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        *self.state.write().await = EngineState::Stopped;
                        break;
                    }
                },

                _ = next_tick(&mut ticker), if ticker.is_some() => {
                    let report = self.tick().await;
                    if report.all_failed() {
                        warn!(
                            pairs = report.pairs,
                            backoff_secs = ERROR_BACKOFF.as_secs(),
                            "Every pair failed, backing off"
                        );
                        ticker = Some(self.ticker(Instant::now() + ERROR_BACKOFF));
                    }
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
