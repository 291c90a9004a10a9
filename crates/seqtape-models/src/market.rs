//! Per-symbol market state.

use seqtape_quant::{PriceMicros, QtySats, TimeStamp};
use serde::{Deserialize, Serialize};

/// Current state of a single market.
///
/// Created lazily on the first update for a symbol and never removed during
/// a session. The sequencer owns the canonical copy; everyone else sees
/// value copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub symbol: String,
    pub price: PriceMicros,
    pub total_qty: QtySats,
    pub last_update: TimeStamp,
}

impl MarketState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}
