//! The strategy contract.
//!
//! Strategies run synchronously inside the hotpath. The sequencer hands
//! them a value copy of the updated market state and a fixed-capacity
//! caller-owned order buffer; they fill `out[0..k]` and report `k`. No
//! allocation on this path, no mutation of the state they observe.

use seqtape_models::{MarketState, Order};
use seqtape_quant::checked::ArithmeticError;
use thiserror::Error;

/// Capacity of the order buffer the sequencer supplies per invocation.
pub const MAX_STRATEGY_ORDERS: usize = 16;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("short_period {short} must be smaller than long_period {long}")]
    InvalidPeriods { short: usize, long: usize },

    #[error("strategy arithmetic: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

pub trait Strategy: Send {
    /// Identifier for logs.
    fn name(&self) -> &str;

    /// React to one market update. Fill `out[0..k]` with new orders and
    /// return `k` (at most `out.len()`). An arithmetic fault escalates to a
    /// halt in the sequencer.
    fn on_market_update(
        &mut self,
        state: &MarketState,
        out: &mut [Order],
    ) -> Result<usize, StrategyError>;

    /// React to an order lifecycle transition the sequencer applied.
    fn on_order_update(&mut self, _order: &Order) {}
}
