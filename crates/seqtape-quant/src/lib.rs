//! # Fixed-Point Monetary Layer
//!
//! Every monetary quantity inside the core is an integer mantissa:
//! - [`PriceMicros`]: 10^-6 of the quote currency (1.23 USD = 1_230_000)
//! - [`QtySats`]: 10^-8 of the base asset (1.0 BTC = 100_000_000)
//! - [`TimeStamp`]: Unix microseconds
//!
//! Exchanges deliver decimals as strings; [`fixed_point`] converts them to
//! mantissas by scanning bytes, never through a float. Floats exist only in
//! the display helpers at the outermost boundary.
//!
//! [`checked`] provides the only arithmetic primitives the core is allowed
//! to use for monetary math: every overflow or division hazard surfaces as
//! a typed error instead of silent wrap-around.

pub mod checked;
pub mod fixed_point;

use std::sync::atomic::{AtomicU64, Ordering};

/// Price in 10^-6 units of the quote currency.
pub type PriceMicros = i64;

/// Quantity in 10^-8 units of the base asset.
pub type QtySats = i64;

/// Unix microseconds.
pub type TimeStamp = i64;

/// Decimal digits carried by a price mantissa.
pub const PRICE_SCALE_DIGITS: u32 = 6;

/// Decimal digits carried by a quantity mantissa.
pub const QTY_SCALE_DIGITS: u32 = 8;

/// Multiplier between a whole quote unit and [`PriceMicros`].
pub const PRICE_SCALE: i64 = 1_000_000;

/// Multiplier between a whole base unit and [`QtySats`].
pub const QTY_SCALE: i64 = 100_000_000;

/// Process-wide monotonic sequence counter.
///
/// Every gateway clones one `Arc<SeqCounter>` so the sequencer sees a single
/// contiguous id stream. The first id handed out is 1.
#[derive(Debug, Default)]
pub struct SeqCounter(AtomicU64);

impl SeqCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Claim the next sequence id.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last id handed out (0 if none).
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Continue an id stream after recovery: the next call to [`Self::next`]
    /// returns `last_seq + 1`.
    pub fn resume_from(&self, last_seq: u64) {
        self.0.store(last_seq, Ordering::SeqCst);
    }
}
