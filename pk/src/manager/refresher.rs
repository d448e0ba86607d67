//! Background refresh task
//!
//! One task per refreshing manager. Timer ticks and manual refresh requests
//! are handled in the same loop, so refreshes never overlap.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::Shared;
use super::state::RefreshOutcome;
use crate::error::PromptError;
use crate::version::FetchKey;

/// Manual refresh requests are rare; a small buffer is plenty
const COMMAND_BUFFER: usize = 8;

pub(crate) enum RefreshCommand {
    Refresh {
        reply: oneshot::Sender<Result<RefreshOutcome, PromptError>>,
    },
}

/// Handle to a running refresher
pub(crate) struct RefresherHandle {
    pub(crate) commands: mpsc::Sender<RefreshCommand>,
    pub(crate) shutdown: oneshot::Sender<()>,
    pub(crate) join: JoinHandle<()>,
}

pub(crate) fn spawn(shared: Arc<Shared>, key: FetchKey) -> RefresherHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(run(shared, key, commands_rx, shutdown_rx));
    RefresherHandle {
        commands: commands_tx,
        shutdown: shutdown_tx,
        join,
    }
}

async fn run(
    shared: Arc<Shared>,
    key: FetchKey,
    mut commands: mpsc::Receiver<RefreshCommand>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let period = shared.options.refresh_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        prompt_id = %shared.prompt_id,
        %key,
        interval_ms = period.as_millis() as u64,
        "Refresher started"
    );

    loop {
        let reply = tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                debug!(prompt_id = %shared.prompt_id, "run: interval tick");
                None
            }
            command = commands.recv() => match command {
                Some(RefreshCommand::Refresh { reply }) => {
                    debug!(prompt_id = %shared.prompt_id, "run: manual refresh");
                    Some(reply)
                }
                None => break,
            },
        };

        // an in-flight fetch is abandoned on shutdown, so nothing swaps after stop
        let outcome = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            outcome = shared.refresh_once(&key) => outcome,
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    info!(prompt_id = %shared.prompt_id, "Refresher stopped");
}
