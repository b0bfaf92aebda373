//! Periodic "still working" signals while a backend call is outstanding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use conversation::ConversationId;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelError, OutputChannel};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Floor for the pause after a rate-limited signal.
pub const MIN_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

struct Run {
    generation: u64,
    token: CancellationToken,
}

/// Tracks at most one signalling task per conversation.
#[derive(Clone)]
pub struct Heartbeat {
    runs: Arc<DashMap<ConversationId, Run>>,
    generations: Arc<AtomicU64>,
    interval: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Heartbeat {
            runs: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            interval,
        }
    }

    /// Starts signalling for `id`, replacing any run already live for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, id: &ConversationId, channel: Arc<dyn OutputChannel>) -> HeartbeatGuard {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.runs.insert(
            id.clone(),
            Run {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(conversation = %id, "Superseding heartbeat");
            previous.token.cancel();
        }

        tokio::spawn(signal_loop(id.clone(), channel, token.clone(), self.interval));

        HeartbeatGuard {
            runs: self.runs.clone(),
            id: id.clone(),
            generation,
            token,
        }
    }

    /// Stops the run for `id`, if any.
    pub fn stop(&self, id: &ConversationId) {
        if let Some((_, run)) = self.runs.remove(id) {
            run.token.cancel();
        }
    }

    pub fn is_live(&self, id: &ConversationId) -> bool {
        self.runs
            .get(id)
            .is_some_and(|run| !run.token.is_cancelled())
    }
}

/// Stops its heartbeat run when dropped. A newer run for the same id is left alone.
pub struct HeartbeatGuard {
    runs: Arc<DashMap<ConversationId, Run>>,
    id: ConversationId,
    generation: u64,
    token: CancellationToken,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.runs
            .remove_if(&self.id, |_, run| run.generation == self.generation);
    }
}

async fn signal_loop(
    id: ConversationId,
    channel: Arc<dyn OutputChannel>,
    token: CancellationToken,
    interval: Duration,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let pause = match channel.signal_activity(&id).await {
            Ok(()) => interval,
            Err(ChannelError::RateLimited { retry_after }) => {
                tracing::warn!(conversation = %id, retry_after = ?retry_after, "Activity signal rate limited");
                retry_after.max(MIN_RATE_LIMIT_PAUSE)
            }
            Err(e) => {
                tracing::error!(conversation = %id, error = %e, "Activity signal failed, stopping heartbeat");
                token.cancel();
                break;
            }
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
    tracing::trace!(conversation = %id, "Heartbeat stopped");
}
