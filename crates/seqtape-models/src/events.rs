//! Sequencer events.
//!
//! A closed tagged union: the discriminator is a `u16` so it can live in the
//! WAL's `type` column unchanged across versions. Dispatch matches on the
//! enum, so adding a kind forces every match site to be revisited at compile
//! time.

use seqtape_quant::{PriceMicros, QtySats, TimeStamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderStatus;

/// Wire discriminator for an event, stored verbatim in the WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    MarketUpdate = 1,
    OrderUpdate = 2,
    BalanceUpdate = 3,
    SystemHalt = 4,
}

impl EventKind {
    /// `None` for discriminators this build does not know; replay skips
    /// those rows with a warning instead of failing.
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::MarketUpdate),
            2 => Some(Self::OrderUpdate),
            3 => Some(Self::BalanceUpdate),
            4 => Some(Self::SystemHalt),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A price/volume tick for one symbol on one venue.
///
/// The dominant event variant; instances are recycled through
/// [`crate::pool::EventPool`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketUpdate {
    pub seq: u64,
    pub ts: TimeStamp,
    pub symbol: String,
    pub price: PriceMicros,
    pub qty: QtySats,
    pub exchange: String,
}

impl MarketUpdate {
    /// Reset all fields, keeping allocated string capacity for reuse.
    pub fn clear(&mut self) {
        self.seq = 0;
        self.ts = 0;
        self.symbol.clear();
        self.price = 0;
        self.qty = 0;
        self.exchange.clear();
    }
}

/// An order lifecycle transition reported by the execution side.
///
/// `qty` is the accumulated filled quantity, not the delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub seq: u64,
    pub ts: TimeStamp,
    pub order_id: String,
    pub status: OrderStatus,
    pub price: PriceMicros,
    pub qty: QtySats,
}

/// A signed balance delta (deposit when positive, withdrawal when negative).
///
/// Deposits enter the system as sequenced events so that replaying the WAL
/// reproduces balances exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub seq: u64,
    pub ts: TimeStamp,
    pub symbol: String,
    pub delta: QtySats,
}

/// Reserved: an operator-initiated halt marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHalt {
    pub seq: u64,
    pub ts: TimeStamp,
    pub reason: String,
}

/// The event union carried by the inbox and the WAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MarketUpdate(MarketUpdate),
    OrderUpdate(OrderUpdate),
    BalanceUpdate(BalanceUpdate),
    SystemHalt(SystemHalt),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event discriminator {0}")]
    UnknownKind(u16),
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl Event {
    pub fn seq(&self) -> u64 {
        match self {
            Event::MarketUpdate(e) => e.seq,
            Event::OrderUpdate(e) => e.seq,
            Event::BalanceUpdate(e) => e.seq,
            Event::SystemHalt(e) => e.seq,
        }
    }

    pub fn ts(&self) -> TimeStamp {
        match self {
            Event::MarketUpdate(e) => e.ts,
            Event::OrderUpdate(e) => e.ts,
            Event::BalanceUpdate(e) => e.ts,
            Event::SystemHalt(e) => e.ts,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::MarketUpdate(_) => EventKind::MarketUpdate,
            Event::OrderUpdate(_) => EventKind::OrderUpdate,
            Event::BalanceUpdate(_) => EventKind::BalanceUpdate,
            Event::SystemHalt(_) => EventKind::SystemHalt,
        }
    }

    /// Stable JSON payload for the WAL row.
    pub fn encode_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Event::MarketUpdate(e) => serde_json::to_vec(e),
            Event::OrderUpdate(e) => serde_json::to_vec(e),
            Event::BalanceUpdate(e) => serde_json::to_vec(e),
            Event::SystemHalt(e) => serde_json::to_vec(e),
        }
    }

    /// Rebuild an event from a WAL row.
    pub fn decode(kind: u16, payload: &[u8]) -> Result<Event, DecodeError> {
        let kind = EventKind::from_u16(kind).ok_or(DecodeError::UnknownKind(kind))?;
        let ev = match kind {
            EventKind::MarketUpdate => Event::MarketUpdate(serde_json::from_slice(payload)?),
            EventKind::OrderUpdate => Event::OrderUpdate(serde_json::from_slice(payload)?),
            EventKind::BalanceUpdate => Event::BalanceUpdate(serde_json::from_slice(payload)?),
            EventKind::SystemHalt => Event::SystemHalt(serde_json::from_slice(payload)?),
        };
        Ok(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_by_kind() {
        let ev = Event::MarketUpdate(MarketUpdate {
            seq: 7,
            ts: 1_704_067_200_000_000,
            symbol: "BTC".into(),
            price: 134_109_000_000_000,
            qty: 12_345_678,
            exchange: "UPBIT".into(),
        });
        let payload = ev.encode_payload().unwrap();
        let back = Event::decode(ev.kind().as_u16(), &payload).unwrap();
        assert_eq!(back, ev);
        assert_eq!(back.seq(), 7);
    }

    #[test]
    fn unknown_discriminator_is_reported_not_guessed() {
        let err = Event::decode(99, b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(99)));
    }

    #[test]
    fn wire_field_names_are_stable() {
        let ev = MarketUpdate {
            seq: 1,
            ts: 2,
            symbol: "ETH".into(),
            price: 3,
            qty: 4,
            exchange: "BITGET_SPOT".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        for key in ["seq", "ts", "symbol", "price", "qty", "exchange"] {
            assert!(json.get(key).is_some(), "missing wire field {key}");
        }
    }

    #[test]
    fn order_status_serializes_as_wire_string() {
        let ev = OrderUpdate {
            seq: 1,
            ts: 2,
            order_id: "abc".into(),
            status: OrderStatus::PartiallyFilled,
            price: 0,
            qty: 0,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"PARTIALLY_FILLED\""));
    }
}
