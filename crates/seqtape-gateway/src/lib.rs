//! # Gateway Adapters
//!
//! Gateways are reconnecting push-sources: each one owns a persistent
//! connection, parses venue payloads with the fixed-point layer, stamps
//! events from the process-wide sequence counter and hands them to the
//! sequencer's bounded inbox. The hotpath is never allowed to block a
//! gateway: on a full inbox the event is dropped and its buffer returned to
//! the pool.
//!
//! - [`worker`] - the generic WebSocket connection loop (backoff, read
//!   timeout, ping, cooperative cancellation) over the [`Gateway`] trait.
//! - [`upbit`] / [`bitget`] - venue adapters.
//! - [`fxrate`] - REST poller for the quote-currency FX rate.

pub mod backoff;
pub mod bitget;
pub mod fxrate;
pub mod inbox;
pub mod upbit;
pub mod worker;

pub use backoff::backoff_delay;
pub use inbox::EventTx;
pub use worker::{Gateway, Outbox, WsConfig, WsWorker};
