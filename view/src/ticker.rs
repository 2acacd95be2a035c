//! Cancellable progress ticker.
//!
//! Re-arms a sleep after each firing rather than running a fixed-rate
//! clock, so jitter accumulates under load instead of ticks bunching up.
//! Each firing only enqueues a message; the view decides on its own task
//! whether a tick still matters. Cancellation is best-effort synchronous:
//! the flag stops the loop and the task is aborted, but a message already
//! enqueued is simply drained and ignored by the receiver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Interval between progress ticks
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

/// A repeating timer feeding messages into a queue until canceled
pub struct ProgressTicker {
    canceled: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressTicker {
    /// Spawn a ticker pushing `message` into `queue` every [`TICK_PERIOD`].
    /// The ticker dies by itself when the queue's receiver is dropped.
    ///
    /// Must be called within an async runtime.
    pub fn spawn<M>(queue: UnboundedSender<M>, message: M) -> Self
    where
        M: Clone + Send + 'static,
    {
        let canceled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&canceled);

        let handle = tokio::spawn(async move {
            loop {
                // Re-armed after each firing, not a fixed-rate clock
                tokio::time::sleep(TICK_PERIOD).await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                if queue.send(message.clone()).is_err() {
                    break;
                }
            }
        });

        Self { canceled, handle }
    }

    /// Stop ticking. Safe to call multiple times.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.handle.abort();
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_arrive() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = ProgressTicker::spawn(tx, ());

        for _ in 0..3 {
            rx.recv().await.expect("tick");
        }
        ticker.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = ProgressTicker::spawn(tx, ());

        rx.recv().await.expect("tick");
        ticker.cancel();
        ticker.cancel(); // idempotent

        // Aborting drops the sender; the channel drains and then closes
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_dies_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let ticker = ProgressTicker::spawn(tx, ());

        drop(rx);
        tokio::time::sleep(TICK_PERIOD * 3).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(ticker.handle.is_finished());
    }
}
