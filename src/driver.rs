//! Driver runs a graph on a tokio task

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::RetryPolicy;
use crate::graph::{Graph, RunStatus, RunSummary};
use crate::{GraphError, Result};

/// Progress of a driven graph, published on a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Task spawned, no round ran yet
    Starting,
    Running {
        rounds: u64,
    },
    Finished,
    /// The run aborted; the message lists the cause chain
    Failed(String),
    Cancelled,
}

impl RunState {
    pub fn is_done(&self) -> bool {
        matches!(self, RunState::Finished | RunState::Failed(_) | RunState::Cancelled)
    }
}

/// Handles for a spawned graph run
pub struct DriverHandle {
    /// Receiver for run state updates
    pub state: watch::Receiver<RunState>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    task: JoinHandle<Result<RunSummary>>,
}

impl DriverHandle {
    /// Wait for the run to finish.
    ///
    /// A cancelled run still returns its summary, with `cancelled` set.
    pub async fn join(self) -> Result<RunSummary> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(GraphError::component_with_source("graph task failed", Box::new(e))),
        }
    }

    /// Request cancellation and wait for the run to stop.
    pub async fn shutdown(self) -> Result<RunSummary> {
        self.cancel.cancel();
        self.join().await
    }
}

/// Driver spawns a task that owns the graph and repeats `run_once`.
///
/// Rounds where every sink answered `AGAIN` are followed by an exponential backoff
/// from the [`RetryPolicy`]; progress resets it. The graph is finalized on the task
/// when the run ends, fails or is cancelled.
pub struct Driver;

impl Driver {
    /// Spawn the run task on the current tokio runtime.
    pub fn spawn(graph: Graph, policy: RetryPolicy) -> DriverHandle {
        let (state_tx, state_rx) = watch::channel(RunState::Starting);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move { Self::run_task(graph, policy, state_tx, cancel_task).await });

        DriverHandle { state: state_rx, cancel, task }
    }

    async fn run_task(
        mut graph: Graph,
        policy: RetryPolicy,
        state_tx: watch::Sender<RunState>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        info!("Graph run task started");
        let mut again_count = 0u32;

        let outcome = loop {
            if cancel.is_cancelled() {
                info!("Graph run cancelled");
                break Ok(None);
            }

            match graph.run_once() {
                Ok(RunStatus::End) => break Ok(Some(RunState::Finished)),
                Ok(RunStatus::Ok) => {
                    again_count = 0;
                    let rounds = graph.summary().rounds;
                    trace!("Round {} made progress", rounds);
                    state_tx.send_replace(RunState::Running { rounds });
                    // Let other tasks (channel consumers) run between rounds
                    tokio::task::yield_now().await;
                }
                Ok(RunStatus::Again) => {
                    again_count += 1;
                    if policy.is_exhausted(again_count) {
                        warn!("Graph made no progress for {} rounds", again_count);
                        break Err(GraphError::Stalled { attempts: again_count });
                    }

                    let backoff = policy.backoff(again_count);
                    debug!("All sinks returned AGAIN ({}), backing off {:?}", again_count, backoff);
                    if !Self::wait(backoff, &cancel).await {
                        info!("Graph run cancelled during backoff");
                        break Ok(None);
                    }
                }
                Err(e) => {
                    error!("Graph run failed: {}", e);
                    break Err(e);
                }
            }
        };

        if outcome.as_ref().is_ok_and(Option::is_none) {
            graph.mark_cancelled();
        }
        graph.finalize();
        let summary = graph.summary().clone();
        info!("Graph run task ended after {} rounds", summary.rounds);

        match outcome {
            Ok(Some(state)) => {
                state_tx.send_replace(state);
                Ok(summary)
            }
            Ok(None) => {
                state_tx.send_replace(RunState::Cancelled);
                Ok(summary)
            }
            Err(e) => {
                state_tx.send_replace(RunState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Sleep for `backoff`; returns `false` if cancelled first.
    async fn wait(backoff: Duration, cancel: &CancellationToken) -> bool {
        if backoff.is_zero() {
            tokio::task::yield_now().await;
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(backoff) => true,
        }
    }
}
