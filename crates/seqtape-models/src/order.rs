//! Orders and their lifecycle.

use seqtape_quant::{PriceMicros, QtySats, TimeStamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    PartiallyFilled,
    Filled,
    Canceled,
}

/// A trading order. All monetary values are fixed-point integers;
/// `price` is 0 for market orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: PriceMicros,
    pub qty: QtySats,
    pub status: OrderStatus,
    pub created_ts: TimeStamp,
}

impl Order {
    /// An order is open while it can still fill.
    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// Quote suffixes recognized in combined market symbols like "BTCUSDT".
const KNOWN_QUOTES: [&str; 4] = ["USDT", "USDC", "KRW", "USD"];

/// Split a market symbol into `(base, quote)`.
///
/// "BTCUSDT" → ("BTC", "USDT"); a bare base symbol like Upbit's "BTC" pairs
/// with `default_quote`.
pub fn split_symbol<'a>(symbol: &'a str, default_quote: &'a str) -> (&'a str, &'a str) {
    for quote in KNOWN_QUOTES {
        if symbol.len() > quote.len() {
            if let Some(base) = symbol.strip_suffix(quote) {
                return (base, quote);
            }
        }
    }
    (symbol, default_quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_means_new_or_partially_filled() {
        let mut order = Order {
            status: OrderStatus::New,
            ..Default::default()
        };
        assert!(order.is_open());
        order.status = OrderStatus::PartiallyFilled;
        assert!(order.is_open());
        order.status = OrderStatus::Filled;
        assert!(!order.is_open());
        order.status = OrderStatus::Canceled;
        assert!(!order.is_open());
    }

    #[test]
    fn split_symbol_recognizes_quote_suffixes() {
        assert_eq!(split_symbol("BTCUSDT", "KRW"), ("BTC", "USDT"));
        assert_eq!(split_symbol("ETHKRW", "USDT"), ("ETH", "KRW"));
        assert_eq!(split_symbol("BTC", "KRW"), ("BTC", "KRW"));
        // A symbol that IS a quote currency does not split into nothing.
        assert_eq!(split_symbol("USDT", "KRW"), ("USDT", "KRW"));
    }

    #[test]
    fn lifecycle_enums_keep_wire_strings() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&OrderType::Market).unwrap(), "\"MARKET\"");
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap(),
            "\"PARTIALLY_FILLED\""
        );
    }
}
