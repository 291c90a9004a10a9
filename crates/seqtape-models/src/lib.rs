//! # Canonical Types
//!
//! Platform-wide event and domain definitions shared by the store, the
//! gateways and the sequencer:
//!
//! - [`events`] - the closed, tagged event union that flows through the
//!   inbox and the write-ahead log, plus the buffer pool for the dominant
//!   variant.
//! - [`market`] - per-symbol market state owned by the sequencer.
//! - [`order`] - orders and their lifecycle enums.
//! - [`balance`] - per-asset balances with algebraic invariants checked on
//!   every mutation.

pub mod balance;
pub mod events;
pub mod market;
pub mod order;
pub mod pool;

pub use balance::{Balance, BalanceBook, BalanceError};
pub use events::{
    BalanceUpdate, DecodeError, Event, EventKind, MarketUpdate, OrderUpdate, SystemHalt,
};
pub use market::MarketState;
pub use order::{split_symbol, Order, OrderStatus, OrderType, Side};
pub use pool::EventPool;
