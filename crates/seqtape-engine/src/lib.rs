//! # Sequencer Engine
//!
//! The single-writer core. One task owns all mutable market and balance
//! state and processes events strictly one at a time:
//!
//! ```text
//! validate seq -> append to WAL -> dispatch -> advance -> checkpoint
//! ```
//!
//! Recovery replays the same dispatch function over the stored log, so a
//! given event sequence produces one final state whether it arrived live or
//! from disk ("backtest is reality").
//!
//! Anything that would corrupt state - a persistence failure, a large
//! sequence gap, trapped arithmetic, a broken balance invariant - is a
//! [`FatalError`]: the loop verifies the book, writes a crash dump and
//! returns the error. The operator restarts; the core never does.

pub mod error;
pub mod execution;
pub mod sequencer;
pub mod sma_cross;
pub mod strategy;

pub use error::FatalError;
pub use execution::{build_execution, Execution, NullExecution, PaperExecution, TradingMode};
pub use sequencer::{MarketView, SeqCheck, Sequencer};
pub use sma_cross::SmaCrossStrategy;
pub use strategy::{Strategy, StrategyError, MAX_STRATEGY_ORDERS};
