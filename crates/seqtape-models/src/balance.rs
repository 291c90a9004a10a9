//! Per-asset balances with algebraic invariants.
//!
//! Invariants, checked on every mutation:
//! - `amount_sats >= 0`
//! - `0 <= reserved_sats <= amount_sats`
//!
//! A mutation that would break them is an error; the sequencer escalates it
//! to a halt rather than carry corrupted book state forward.

use std::collections::{BTreeMap, HashMap};

use seqtape_quant::checked::{self, ArithmeticError};
use seqtape_quant::{PriceMicros, QtySats, QTY_SCALE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("balance invariant broken for {symbol}: amount={amount_sats} reserved={reserved_sats}")]
    InvariantBroken {
        symbol: String,
        amount_sats: QtySats,
        reserved_sats: QtySats,
    },
    #[error("insufficient {symbol}: requested {requested}, available {available}")]
    Insufficient {
        symbol: String,
        requested: QtySats,
        available: QtySats,
    },
    #[error("balance arithmetic: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

/// Holdings of a single asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub symbol: String,
    pub amount_sats: QtySats,
    pub reserved_sats: QtySats,
    pub last_update_seq: u64,
}

impl Balance {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Spendable amount.
    pub fn available_sats(&self) -> QtySats {
        self.amount_sats - self.reserved_sats
    }

    pub fn credit(&mut self, amount: QtySats, seq: u64) -> Result<(), BalanceError> {
        self.amount_sats = checked::add(self.amount_sats, amount)?;
        self.last_update_seq = seq;
        self.verify()
    }

    pub fn debit(&mut self, amount: QtySats, seq: u64) -> Result<(), BalanceError> {
        if self.available_sats() < amount {
            return Err(BalanceError::Insufficient {
                symbol: self.symbol.clone(),
                requested: amount,
                available: self.available_sats(),
            });
        }
        self.amount_sats = checked::sub(self.amount_sats, amount)?;
        self.last_update_seq = seq;
        self.verify()
    }

    pub fn reserve(&mut self, amount: QtySats, seq: u64) -> Result<(), BalanceError> {
        let reserved = checked::add(self.reserved_sats, amount)?;
        if reserved > self.amount_sats {
            return Err(BalanceError::Insufficient {
                symbol: self.symbol.clone(),
                requested: amount,
                available: self.available_sats(),
            });
        }
        self.reserved_sats = reserved;
        self.last_update_seq = seq;
        self.verify()
    }

    pub fn release(&mut self, amount: QtySats, seq: u64) -> Result<(), BalanceError> {
        if amount > self.reserved_sats {
            return Err(BalanceError::Insufficient {
                symbol: self.symbol.clone(),
                requested: amount,
                available: self.reserved_sats,
            });
        }
        self.reserved_sats = checked::sub(self.reserved_sats, amount)?;
        self.last_update_seq = seq;
        self.verify()
    }

    /// Check the algebraic invariants.
    pub fn verify(&self) -> Result<(), BalanceError> {
        if self.amount_sats < 0 || self.reserved_sats < 0 || self.reserved_sats > self.amount_sats
        {
            return Err(BalanceError::InvariantBroken {
                symbol: self.symbol.clone(),
                amount_sats: self.amount_sats,
                reserved_sats: self.reserved_sats,
            });
        }
        Ok(())
    }
}

/// All balances, keyed by asset symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceBook {
    balances: HashMap<String, Balance>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a balance, creating an empty one on first touch.
    pub fn get_mut(&mut self, symbol: &str) -> &mut Balance {
        self.balances
            .entry(symbol.to_string())
            .or_insert_with(|| Balance::new(symbol))
    }

    pub fn get(&self, symbol: &str) -> Option<&Balance> {
        self.balances.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Value-typed copy for external readers, ordered for stable output.
    pub fn snapshot(&self) -> BTreeMap<String, Balance> {
        self.balances
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the book wholesale (snapshot install during recovery).
    pub fn restore(&mut self, balances: impl IntoIterator<Item = (String, Balance)>) {
        self.balances = balances.into_iter().collect();
    }

    /// Check every balance; first broken invariant wins.
    pub fn verify_all(&self) -> Result<(), BalanceError> {
        for balance in self.balances.values() {
            balance.verify()?;
        }
        Ok(())
    }

    /// Total value in quote micros: `Σ amount × price / QTY_SCALE` over the
    /// symbols present in `prices`. Unpriced symbols contribute zero.
    pub fn total_equity(
        &self,
        prices: &HashMap<String, PriceMicros>,
    ) -> Result<i64, BalanceError> {
        let mut total: i64 = 0;
        for (symbol, balance) in &self.balances {
            let Some(price) = prices.get(symbol) else {
                continue;
            };
            let value = checked::mul_div(balance.amount_sats, *price, QTY_SCALE)?;
            total = checked::add(total, value)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_then_debit() {
        let mut b = Balance::new("BTC");
        b.credit(100, 1).unwrap();
        assert_eq!(b.amount_sats, 100);
        b.debit(30, 2).unwrap();
        assert_eq!(b.amount_sats, 70);
        assert_eq!(b.last_update_seq, 2);
        b.verify().unwrap();
    }

    #[test]
    fn reserve_and_release() {
        let mut b = Balance {
            symbol: "ETH".into(),
            amount_sats: 1_000,
            ..Default::default()
        };
        b.reserve(400, 1).unwrap();
        assert_eq!(b.reserved_sats, 400);
        assert_eq!(b.available_sats(), 600);
        b.release(200, 2).unwrap();
        assert_eq!(b.reserved_sats, 200);
        b.verify().unwrap();
    }

    #[test]
    fn debit_below_zero_is_an_error() {
        let mut b = Balance {
            symbol: "BTC".into(),
            amount_sats: 50,
            ..Default::default()
        };
        assert!(matches!(
            b.debit(100, 1),
            Err(BalanceError::Insufficient { .. })
        ));
    }

    #[test]
    fn reserved_funds_are_not_spendable() {
        let mut b = Balance {
            symbol: "BTC".into(),
            amount_sats: 100,
            ..Default::default()
        };
        b.reserve(80, 1).unwrap();
        assert!(b.debit(50, 2).is_err());
        b.release(80, 3).unwrap();
        b.debit(50, 4).unwrap();
    }

    #[test]
    fn verify_rejects_negative_amount() {
        let b = Balance {
            symbol: "BTC".into(),
            amount_sats: -1,
            ..Default::default()
        };
        assert!(matches!(
            b.verify(),
            Err(BalanceError::InvariantBroken { .. })
        ));
    }

    #[test]
    fn verify_rejects_reserved_beyond_amount() {
        let b = Balance {
            symbol: "BTC".into(),
            amount_sats: 100,
            reserved_sats: 200,
            ..Default::default()
        };
        assert!(matches!(
            b.verify(),
            Err(BalanceError::InvariantBroken { .. })
        ));
    }

    #[test]
    fn book_creates_on_demand_and_snapshots() {
        let mut book = BalanceBook::new();
        book.get_mut("BTC").credit(1_000, 1).unwrap();
        book.get_mut("ETH").credit(5_000, 2).unwrap();
        book.verify_all().unwrap();

        let snap = book.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["BTC"].amount_sats, 1_000);
    }

    #[test]
    fn equity_sums_priced_symbols_only() {
        let mut book = BalanceBook::new();
        // 1.5 BTC and 1000 USDT-ish units that carry no price entry.
        book.get_mut("BTC").credit(150_000_000, 1).unwrap();
        book.get_mut("USDT").credit(1_000_00000000, 2).unwrap();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), 90_000_000_000i64); // 90k in micros
        assert_eq!(book.total_equity(&prices).unwrap(), 135_000_000_000);
    }
}
