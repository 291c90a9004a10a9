//! Non-blocking delivery into the sequencer inbox.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use seqtape_models::{Event, EventPool, MarketUpdate};
use tokio::sync::mpsc;
use tracing::warn;

/// A producer handle shared by every gateway: bounded `try_send` with
/// drop-on-full, so the hotpath can never apply back-pressure to a
/// connection task.
#[derive(Clone)]
pub struct EventTx {
    sender: mpsc::Sender<Event>,
    pool: Arc<EventPool>,
    dropped: Arc<AtomicU64>,
}

impl EventTx {
    pub fn new(sender: mpsc::Sender<Event>, pool: Arc<EventPool>) -> Self {
        Self {
            sender,
            pool,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn pool(&self) -> &Arc<EventPool> {
        &self.pool
    }

    /// Hand a pooled market update to the sequencer. On overflow the buffer
    /// goes straight back to the pool and the drop counter advances.
    pub fn push_market(&self, ev: MarketUpdate) {
        match self.sender.try_send(Event::MarketUpdate(ev)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Event::MarketUpdate(ev))) => {
                self.pool.release(ev);
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "inbox full, market update dropped");
            }
            Err(mpsc::error::TrySendError::Closed(Event::MarketUpdate(ev))) => {
                // Sequencer is gone (shutdown); recycle quietly.
                self.pool.release(ev);
            }
            Err(_) => unreachable!("pushed variant comes back unchanged"),
        }
    }

    /// Hand a non-pooled event to the sequencer with the same
    /// drop-on-full policy.
    pub fn push(&self, ev: Event) {
        if self.sender.try_send(ev).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, "inbox full, event dropped");
        }
    }

    /// Events dropped on overflow since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_releases_the_buffer_and_counts() {
        let (tx, mut rx) = mpsc::channel(1);
        let pool = Arc::new(EventPool::new());
        let etx = EventTx::new(tx, pool.clone());

        let mut ev = pool.acquire();
        ev.seq = 1;
        ev.symbol.push_str("BTC");
        etx.push_market(ev);

        let mut ev = pool.acquire();
        ev.seq = 2;
        etx.push_market(ev); // channel capacity 1: dropped

        assert_eq!(etx.dropped(), 1);
        assert_eq!(pool.pooled(), 1); // the dropped buffer came back

        // The first event is intact in the inbox.
        let got = rx.try_recv().unwrap();
        assert_eq!(got.seq(), 1);
        assert!(rx.try_recv().is_err());
    }
}
