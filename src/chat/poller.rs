//! Polling synchronizer
//!
//! Keeps a `ChatThread` in step with its store: one immediate non-silent
//! fetch, then a silent fetch every interval. A cycle is only scheduled after
//! the previous one has fully settled, so polls never overlap.

use crate::chat::{ChatThread, ThreadState};
use crate::store::MessageStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Polling runs only when enabled
    pub enabled: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            enabled: true,
        }
    }
}

impl PollConfig {
    /// Enabled polling at `interval`
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
        }
    }
}

/// Running poll loop; stops when dropped
pub struct PollHandle {
    task: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    state: Arc<RwLock<ThreadState>>,
}

impl PollHandle {
    fn new<S: MessageStore>(chat: &ChatThread<S>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            task,
            in_flight: chat.in_flight.clone(),
            generation: chat.generation.clone(),
            state: chat.state.clone(),
        }
    }

    /// True while the loop is scheduled
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the loop
    ///
    /// The pending timer is dropped and results of a cycle still in flight
    /// are discarded. The single-flight guard and `loading` are reset.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.in_flight.store(false, Ordering::SeqCst);
            // If the lock is busy, the aborted cycle's guard clears it on drop
            if let Ok(mut state) = self.state.try_write() {
                state.clear_loading();
            }
            info!("Polling stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts poll loops for chat threads
pub struct Synchronizer;

impl Synchronizer {
    /// Start polling `chat`
    ///
    /// Returns an idle handle when polling is disabled or the thread id is
    /// empty. To change parameters, stop the handle and start a new one.
    pub fn start<S: MessageStore>(chat: &ChatThread<S>, config: PollConfig) -> PollHandle {
        if !config.enabled || chat.thread_id().is_empty() {
            debug!("Polling not started (enabled: {}, thread: {:?})", config.enabled, chat.thread_id());
            return PollHandle::new(chat, None);
        }

        info!(
            "Polling thread {} every {} ms",
            chat.thread_id(),
            config.interval.as_millis()
        );

        let worker = chat.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = worker.refresh(false).await {
                debug!("Initial fetch failed: {}", e);
            }

            loop {
                tokio::time::sleep(config.interval).await;
                if let Err(e) = worker.refresh(true).await {
                    debug!("Background fetch failed: {}", e);
                }
            }
        });

        PollHandle::new(chat, Some(task))
    }
}
