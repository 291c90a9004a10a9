//! Buffer pool for the dominant event variant.
//!
//! Gateways acquire a cleared [`MarketUpdate`], fill it, and hand it to the
//! sequencer through the inbox; whoever still owns the buffer when it stops
//! moving (the sequencer after dispatch, the gateway after an overflow drop)
//! releases it here. Released buffers keep their string capacity, so the
//! steady state allocates nothing per tick.

use std::sync::Mutex;

use crate::events::MarketUpdate;

const DEFAULT_MAX_POOLED: usize = 4096;

#[derive(Debug)]
pub struct EventPool {
    free: Mutex<Vec<MarketUpdate>>,
    max_pooled: usize,
}

impl Default for EventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_pooled: DEFAULT_MAX_POOLED,
        }
    }

    /// Pre-fill the free list so the first ticks of a session do not
    /// allocate.
    pub fn warmup(&self, count: usize) {
        let mut free = self.free.lock().expect("event pool poisoned");
        let target = count.min(self.max_pooled);
        while free.len() < target {
            free.push(MarketUpdate::default());
        }
    }

    /// Take a cleared buffer, allocating only if the pool is empty.
    pub fn acquire(&self) -> MarketUpdate {
        let mut free = self.free.lock().expect("event pool poisoned");
        free.pop().unwrap_or_default()
    }

    /// Reset a buffer and return it to the pool.
    pub fn release(&self, mut ev: MarketUpdate) {
        ev.clear();
        let mut free = self.free.lock().expect("event pool poisoned");
        if free.len() < self.max_pooled {
            free.push(ev);
        }
    }

    pub fn pooled(&self) -> usize {
        self.free.lock().expect("event pool poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffers_come_back_cleared() {
        let pool = EventPool::new();
        let mut ev = pool.acquire();
        ev.symbol.push_str("BTC");
        ev.price = 50_000_000_000;
        ev.seq = 9;
        pool.release(ev);

        let ev = pool.acquire();
        assert_eq!(ev.symbol, "");
        assert_eq!(ev.price, 0);
        assert_eq!(ev.seq, 0);
    }

    #[test]
    fn warmup_prefills_the_free_list() {
        let pool = EventPool::new();
        pool.warmup(32);
        assert_eq!(pool.pooled(), 32);
        let _ev = pool.acquire();
        assert_eq!(pool.pooled(), 31);
    }
}
