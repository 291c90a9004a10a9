//! SQLite-backed write-ahead event log.
//!
//! One row per event, primary-keyed by the sequence id, inserted before any
//! state mutation. A duplicate id or any I/O failure is an error the caller
//! treats as fatal. The `metadata` table is a last-writer-wins KV channel
//! for state that is not part of the event stream (symbol metadata,
//! favorites).

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use seqtape_models::{DecodeError, Event};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event store I/O: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("event encode: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (or create) the store and apply the write-ahead pragmas.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", -2000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id      INTEGER PRIMARY KEY,
                type    INTEGER NOT NULL,
                ts      INTEGER NOT NULL,
                payload BLOB    NOT NULL,
                version INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key        TEXT PRIMARY KEY,
                value      TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self { conn })
    }

    /// Durably append one event. The id column is the event's sequence
    /// number; inserting a duplicate fails on the primary key.
    pub fn append(&self, ev: &Event) -> Result<(), StoreError> {
        let payload = ev.encode_payload()?;
        self.conn.execute(
            "INSERT INTO events (id, type, ts, payload) VALUES (?1, ?2, ?3, ?4)",
            params![ev.seq() as i64, ev.kind().as_u16(), ev.ts(), payload],
        )?;
        Ok(())
    }

    /// Highest stored sequence id, 0 when the log is empty.
    pub fn last_seq(&self) -> Result<u64, StoreError> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM events", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) as u64)
    }

    /// All events with `seq >= from_seq`, ascending. Rows with a
    /// discriminator this build does not know are skipped with a warning;
    /// a row whose payload fails to parse is an error (the log is supposed
    /// to be ours).
    pub fn load_events(&self, from_seq: u64) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, type, payload FROM events WHERE id >= ?1 ORDER BY id ASC")?;
        let mut rows = stmt.query(params![from_seq as i64])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let kind: u16 = row.get(1)?;
            let payload: Vec<u8> = row.get(2)?;
            match Event::decode(kind, &payload) {
                Ok(ev) => events.push(ev),
                Err(DecodeError::UnknownKind(k)) => {
                    warn!(seq = id, kind = k, "unknown event discriminator in log, skipping");
                }
                Err(DecodeError::Payload(e)) => return Err(StoreError::Encode(e)),
            }
        }
        Ok(events)
    }

    /// Last-writer-wins upsert into the metadata side-table.
    pub fn upsert_metadata(&self, key: &str, value: &str, updated_at: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    /// A missing key is `None`, not an error.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqtape_models::{MarketUpdate, OrderStatus, OrderUpdate};

    fn market(seq: u64, price: i64) -> Event {
        Event::MarketUpdate(MarketUpdate {
            seq,
            ts: 1_700_000_000_000_000 + seq as i64,
            symbol: "BTC".into(),
            price,
            qty: 1,
            exchange: "UPBIT".into(),
        })
    }

    #[test]
    fn append_then_load_round_trips() {
        let store = EventStore::open_in_memory().unwrap();
        store.append(&market(1, 100)).unwrap();
        store.append(&market(2, 200)).unwrap();
        store
            .append(&Event::OrderUpdate(OrderUpdate {
                seq: 3,
                ts: 3,
                order_id: "o-1".into(),
                status: OrderStatus::Filled,
                price: 100,
                qty: 10,
            }))
            .unwrap();

        let events = store.load_events(1).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].seq(), 1);
        assert_eq!(events[2].seq(), 3);

        let tail = store.load_events(3).unwrap();
        assert_eq!(tail.len(), 1);
        assert!(matches!(tail[0], Event::OrderUpdate(_)));
    }

    #[test]
    fn duplicate_seq_is_rejected() {
        let store = EventStore::open_in_memory().unwrap();
        store.append(&market(5, 100)).unwrap();
        assert!(store.append(&market(5, 999)).is_err());
    }

    #[test]
    fn last_seq_tracks_the_max() {
        let store = EventStore::open_in_memory().unwrap();
        assert_eq!(store.last_seq().unwrap(), 0);
        store.append(&market(4, 1)).unwrap();
        store.append(&market(9, 1)).unwrap();
        assert_eq!(store.last_seq().unwrap(), 9);
    }

    #[test]
    fn unknown_discriminator_rows_are_skipped() {
        let store = EventStore::open_in_memory().unwrap();
        store.append(&market(1, 100)).unwrap();
        // A row written by a future build with a kind we do not know.
        store
            .conn
            .execute(
                "INSERT INTO events (id, type, ts, payload) VALUES (2, 99, 2, X'7B7D')",
                [],
            )
            .unwrap();
        store.append(&market(3, 300)).unwrap();

        let events = store.load_events(1).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].seq(), 3);
    }

    #[test]
    fn metadata_upsert_is_last_writer_wins() {
        let store = EventStore::open_in_memory().unwrap();
        assert_eq!(store.get_metadata("coin:BTC").unwrap(), None);

        store.upsert_metadata("coin:BTC", "v1", 10).unwrap();
        store.upsert_metadata("coin:BTC", "v2", 20).unwrap();
        assert_eq!(store.get_metadata("coin:BTC").unwrap(), Some("v2".into()));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let store = EventStore::open(&path).unwrap();
            store.append(&market(1, 100)).unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        assert_eq!(store.last_seq().unwrap(), 1);
        assert_eq!(store.load_events(1).unwrap().len(), 1);
    }
}
