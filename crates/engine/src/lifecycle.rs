use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use common::EngineState;

use crate::runner::{RunSummary, StrategyRunner};

/// Cloneable handle for whoever supervises the engine (the binary's signal
/// handler, tests).
#[derive(Clone)]
pub struct EngineHandle {
    state: Arc<RwLock<EngineState>>,
    cancel: CancellationToken,
}

impl EngineHandle {
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Ask every runner to stop at its next suspension point.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if *state == EngineState::Running {
            *state = EngineState::Stopping;
        }
        drop(state);
        info!("Engine shutdown requested");
        self.cancel.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Owns the strategy runners and drives them as one tokio task each.
pub struct Engine {
    runners: Vec<StrategyRunner>,
    state: Arc<RwLock<EngineState>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(runners: Vec<StrategyRunner>) -> (Self, EngineHandle) {
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let cancel = CancellationToken::new();

        let handle = EngineHandle {
            state: state.clone(),
            cancel: cancel.clone(),
        };
        let engine = Engine {
            runners,
            state,
            cancel,
        };
        (engine, handle)
    }

    /// Run every strategy until all loops end. Returns one summary per
    /// runner that finished without panicking.
    pub async fn run(self) -> Vec<RunSummary> {
        info!(strategies = self.runners.len(), "Engine starting");
        *self.state.write().await = EngineState::Running;

        let mut tasks = JoinSet::new();
        for runner in self.runners {
            let runner = runner.with_cancel(self.cancel.child_token());
            tasks.spawn(runner.trade());
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!(error = %e, "Strategy task panicked"),
            }
        }

        *self.state.write().await = EngineState::Stopped;
        info!("Engine stopped");
        summaries
    }
}
