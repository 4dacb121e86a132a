use crate::events::{EngineEvent, EventSender};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic tick task. It only posts `Tick` events and never touches engine
/// state; the task is aborted on `cancel` and on drop.
#[derive(Debug)]
pub struct TickSource {
    generation: u64,
    handle: JoinHandle<()>,
}

impl TickSource {
    /// Must be called from within a tokio runtime.
    pub fn spawn(period: Duration, generation: u64, events: EventSender) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; playback starts one period later.
            interval.tick().await;
            loop {
                interval.tick().await;
                if events.send(EngineEvent::Tick { generation }).is_err() {
                    tracing::debug!(generation, "event stream closed, tick source exiting");
                    break;
                }
            }
        });
        tracing::debug!(generation, period_us = period.as_micros() as u64, "tick source started");
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        // Drop aborts.
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!(generation = self.generation, "tick source stopped");
    }
}
