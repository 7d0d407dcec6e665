//! Paced reveal of accumulated text
//!
//! Network delivery is bursty; the product requirement is a steady,
//! readable reveal rate. The scheduler drains the accumulator into the
//! displayed prefix a bounded number of characters per tick — bounded
//! catch-up, never an instant flush — and `displayed` is a prefix of the
//! accumulated text at every observation point.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::ChatState;

/// Pacing parameters for the reveal scheduler.
#[derive(Debug, Clone, Copy)]
pub struct RevealConfig {
    /// Fixed tick cadence
    pub tick: Duration,
    /// Characters revealed per tick; a small constant, not proportional to
    /// the backlog
    pub chars_per_tick: usize,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            chars_per_tick: 2,
        }
    }
}

/// Spawn the scheduler for one turn.
///
/// The task stops ticking while caught up and resumes on `notify` when the
/// accumulator grows. It exits when `cancel` fires; every turn gets a fresh
/// task, so a stale scheduler can never write into a later turn's buffers.
pub(crate) fn spawn(
    state: Arc<Mutex<ChatState>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    config: RevealConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let behind = state.lock().reveal_gap() > 0;
            if behind {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        state.lock().advance_reveal(config.chars_per_tick);
                    }
                }
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = notify.notified() => {
                        ticker.reset();
                    }
                }
            }
        }
    })
}
