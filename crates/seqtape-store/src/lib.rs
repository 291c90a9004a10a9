//! # Durable Storage
//!
//! Two pieces, both owned by the startup path and the sequencer:
//!
//! - [`store::EventStore`] - the append-only write-ahead log (SQLite,
//!   `journal_mode=WAL`, `synchronous=NORMAL`) keyed by sequence id, plus a
//!   small key-value side-table for cross-session metadata.
//! - [`snapshot::SnapshotManager`] - periodic JSON checkpoints of market
//!   state so recovery replays only the WAL tail.

pub mod snapshot;
pub mod store;

pub use snapshot::{Snapshot, SnapshotError, SnapshotManager};
pub use store::{EventStore, StoreError};
