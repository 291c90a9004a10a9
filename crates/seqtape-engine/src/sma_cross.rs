//! SMA crossover reference strategy.
//!
//! Keeps the last `long_period` prices in a ring buffer with a running sum,
//! so each tick costs O(short_period) and allocates nothing. Signals fire
//! on the short SMA crossing the long SMA:
//!
//! - golden cross (short rises through long) → BUY MARKET
//! - dead cross (short falls through long) → SELL MARKET
//!
//! The first evaluation after the window fills never fires: the previous
//! SMA pair is still zero.

use seqtape_models::{MarketState, Order, OrderStatus, OrderType, Side};
use seqtape_quant::checked;
use seqtape_quant::QtySats;

use crate::strategy::{Strategy, StrategyError};

/// Fixed order size until sizing is wired to risk limits.
const MVP_ORDER_QTY_SATS: QtySats = 10_000;

pub struct SmaCrossStrategy {
    symbol: String,
    short_period: usize,
    long_period: usize,

    // Ring buffer state.
    prices: Vec<i64>,
    head: usize,
    count: usize,
    sum: i64,

    prev_short_sma: i64,
    prev_long_sma: i64,
}

impl SmaCrossStrategy {
    pub fn new(
        symbol: impl Into<String>,
        short_period: usize,
        long_period: usize,
    ) -> Result<Self, StrategyError> {
        if short_period == 0 || short_period >= long_period {
            return Err(StrategyError::InvalidPeriods {
                short: short_period,
                long: long_period,
            });
        }
        Ok(Self {
            symbol: symbol.into(),
            short_period,
            long_period,
            prices: vec![0; long_period],
            head: 0,
            count: 0,
            sum: 0,
            prev_short_sma: 0,
            prev_long_sma: 0,
        })
    }

    /// SMA over the most recent `short_period` entries, walking the ring
    /// backwards from the latest write. Integer division truncates toward
    /// zero.
    fn short_sma(&self) -> Result<i64, StrategyError> {
        let mut sum: i64 = 0;
        let mut idx = self.head;
        for _ in 0..self.short_period {
            idx = if idx == 0 { self.long_period - 1 } else { idx - 1 };
            sum = checked::add(sum, self.prices[idx])?;
        }
        Ok(checked::div(sum, self.short_period as i64)?)
    }

    fn make_order(&self, side: Side, price: i64) -> Order {
        Order {
            id: String::new(), // assigned by the sequencer
            symbol: self.symbol.clone(),
            side,
            order_type: OrderType::Market,
            price,
            qty: MVP_ORDER_QTY_SATS,
            status: OrderStatus::New,
            created_ts: 0,
        }
    }
}

impl Strategy for SmaCrossStrategy {
    fn name(&self) -> &str {
        "sma-cross"
    }

    fn on_market_update(
        &mut self,
        state: &MarketState,
        out: &mut [Order],
    ) -> Result<usize, StrategyError> {
        if state.symbol != self.symbol {
            return Ok(0);
        }

        let price = state.price;

        // Evict the oldest price from the running sum once the window is
        // full; `head` points at the oldest slot exactly then.
        if self.count == self.long_period {
            self.sum = checked::sub(self.sum, self.prices[self.head])?;
        }

        self.prices[self.head] = price;
        self.sum = checked::add(self.sum, price)?;
        self.head = (self.head + 1) % self.long_period;
        if self.count < self.long_period {
            self.count += 1;
        }

        if self.count < self.long_period {
            return Ok(0);
        }

        let long_sma = checked::div(self.sum, self.long_period as i64)?;
        let short_sma = self.short_sma()?;

        let mut produced = 0;
        if self.prev_short_sma != 0 && self.prev_long_sma != 0 {
            if self.prev_short_sma <= self.prev_long_sma
                && short_sma > long_sma
                && produced < out.len()
            {
                out[produced] = self.make_order(Side::Buy, price);
                produced += 1;
            }
            if self.prev_short_sma >= self.prev_long_sma
                && short_sma < long_sma
                && produced < out.len()
            {
                out[produced] = self.make_order(Side::Sell, price);
                produced += 1;
            }
        }

        self.prev_short_sma = short_sma;
        self.prev_long_sma = long_sma;

        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::MAX_STRATEGY_ORDERS;

    fn tick(symbol: &str, price: i64) -> MarketState {
        MarketState {
            symbol: symbol.into(),
            price,
            total_qty: 1,
            last_update: 0,
        }
    }

    fn buffer() -> Vec<Order> {
        vec![Order::default(); MAX_STRATEGY_ORDERS]
    }

    #[test]
    fn construction_rejects_bad_periods() {
        assert!(SmaCrossStrategy::new("BTC", 5, 3).is_err());
        assert!(SmaCrossStrategy::new("BTC", 3, 3).is_err());
        assert!(SmaCrossStrategy::new("BTC", 0, 3).is_err());
        assert!(SmaCrossStrategy::new("BTC", 3, 5).is_ok());
    }

    #[test]
    fn golden_cross_fires_exactly_once() {
        let mut strat = SmaCrossStrategy::new("BTC", 3, 5).unwrap();
        let mut out = buffer();

        // Five flat ticks: window fills, nothing fires.
        for _ in 0..5 {
            let n = strat.on_market_update(&tick("BTC", 100), &mut out).unwrap();
            assert_eq!(n, 0);
        }

        // The jump tick: short SMA rises through the long SMA.
        let n = strat.on_market_update(&tick("BTC", 200), &mut out).unwrap();
        assert_eq!(n, 1);
        assert_eq!(out[0].side, Side::Buy);
        assert_eq!(out[0].order_type, OrderType::Market);
        assert_eq!(out[0].price, 200);
        assert_eq!(out[0].qty, MVP_ORDER_QTY_SATS);
    }

    #[test]
    fn dead_cross_emits_a_sell() {
        let mut strat = SmaCrossStrategy::new("BTC", 2, 3).unwrap();
        let mut out = buffer();

        for price in [100, 100, 100] {
            assert_eq!(strat.on_market_update(&tick("BTC", price), &mut out).unwrap(), 0);
        }
        // Rise first so prev_short > prev_long, then collapse. The first
        // falling tick leaves the short SMA above the long one (the spike
        // is still inside the short window); the second completes the
        // cross.
        assert_eq!(strat.on_market_update(&tick("BTC", 200), &mut out).unwrap(), 1);
        assert_eq!(out[0].side, Side::Buy);
        assert_eq!(strat.on_market_update(&tick("BTC", 10), &mut out).unwrap(), 0);
        let n = strat.on_market_update(&tick("BTC", 10), &mut out).unwrap();
        assert_eq!(n, 1);
        assert_eq!(out[0].side, Side::Sell);
    }

    #[test]
    fn other_symbols_are_ignored() {
        let mut strat = SmaCrossStrategy::new("BTC", 3, 5).unwrap();
        let mut out = buffer();
        for _ in 0..10 {
            assert_eq!(strat.on_market_update(&tick("ETH", 999), &mut out).unwrap(), 0);
        }
    }

    #[test]
    fn state_is_not_mutated_by_evaluation() {
        let mut strat = SmaCrossStrategy::new("BTC", 3, 5).unwrap();
        let state = tick("BTC", 100);
        let before = state.clone();
        let mut out = buffer();
        strat.on_market_update(&state, &mut out).unwrap();
        assert_eq!(state, before);
    }
}
