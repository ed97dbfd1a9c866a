//! One-shot cancellable timers
//!
//! Each loop owns at most one pending timer. Firing sends a tick into the
//! scheduler queue; cancelling aborts the sleeping task. A tick can still be
//! queued just before the abort lands, so ticks carry the generation they
//! were armed with and the owner ignores any that do not match.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Timer slot with its own generation counter
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<TimerHandle>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is pending and arm a fresh timer that sends
    /// `make_tick(generation)` after `delay`
    pub fn arm<E, F>(&mut self, delay: Duration, tx: &mpsc::UnboundedSender<E>, make_tick: F)
    where
        E: Send + 'static,
        F: FnOnce(u64) -> E + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the scheduler stopped
            let _ = tx.send(make_tick(generation));
        });
        self.pending = Some(TimerHandle { generation, task });
    }

    /// Drop the pending timer; any tick already in flight becomes stale
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
        self.generation += 1;
    }

    /// True when `generation` matches the timer that is currently armed.
    /// Clears the slot so a matched tick is consumed exactly once.
    pub fn accept(&mut self, generation: u64) -> bool {
        let current = self.pending.as_ref().is_some_and(|h| h.generation() == generation);
        if current {
            self.pending = None;
        }
        current
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TimerSlot::new();
        slot.arm(Duration::from_secs(5), &tx, |generation| generation);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let generation = rx.recv().await.unwrap();
        assert!(slot.accept(generation));
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut slot = TimerSlot::new();
        slot.arm(Duration::from_secs(1), &tx, |generation| generation);
        slot.cancel();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_previous_generation() {
        let (tx, _rx) = mpsc::unbounded_channel::<u64>();
        let mut slot = TimerSlot::new();
        slot.arm(Duration::from_secs(1), &tx, |generation| generation);
        let first = slot.pending.as_ref().map(TimerHandle::generation).unwrap();
        slot.arm(Duration::from_secs(1), &tx, |generation| generation);

        assert!(!slot.accept(first));
        assert!(slot.is_armed());
    }
}
