use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LiveConfig;
use crate::error::PollError;
use crate::session::{CycleReport, LiveSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

pub struct PollerHandle {
    cancel_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<PollState>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub fn state(&self) -> PollState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state transition of the loop.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    /// Requests shutdown; an in-flight cycle finishes first.
    pub async fn stop(self) -> Result<(), PollError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(PollError::from)
    }
}

/// Runs one cycle if the stored configuration enables polling. Failures are
/// logged and reported as `None`.
pub async fn poll_once(session: &LiveSession, config: &LiveConfig) -> Option<CycleReport> {
    if !config.enabled {
        debug!(collection = session.collection(), "live polling disabled");
        return None;
    }
    match session.run_cycle(config).await {
        Ok(report) => Some(report),
        Err(err) => {
            warn!(collection = session.collection(), error = %err, "poll cycle failed");
            None
        }
    }
}

/// Spawns the poll loop. Cycles never overlap: the interval sleep starts
/// once the previous cycle, including its detail fetches, has settled.
/// Configuration is re-read before every cycle.
pub fn spawn_poller(session: Arc<LiveSession>) -> PollerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let (state_tx, state_rx) = watch::channel(PollState::Idle);
    let join = tokio::spawn(async move {
        loop {
            let config = session.config().await;

            if config.enabled {
                let _ = state_tx.send(PollState::Polling);
                if let Some(report) = poll_once(&session, &config).await {
                    debug!(
                        collection = session.collection(),
                        inserted = report.inserted_ids.len(),
                        failed = report.fetch.failed().len(),
                        "poll cycle finished"
                    );
                }
                let _ = state_tx.send(PollState::Idle);
            } else {
                debug!(collection = session.collection(), "live polling disabled");
            }

            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("poller shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(config.interval()) => {}
            }
        }
    });

    PollerHandle {
        cancel_tx,
        state_rx,
        join,
    }
}
