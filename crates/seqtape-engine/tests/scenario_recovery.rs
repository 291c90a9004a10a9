//! Recovery scenarios: the WAL is the source of truth and replay shares the
//! live dispatch path.

use std::sync::Arc;

use seqtape_engine::Sequencer;
use seqtape_models::{Event, EventPool, MarketUpdate};
use seqtape_store::{EventStore, SnapshotManager};

fn market_event(seq: u64, symbol: &str, price: i64, qty: i64) -> Event {
    Event::MarketUpdate(MarketUpdate {
        seq,
        ts: 1_704_067_200_000_000 + seq as i64,
        symbol: symbol.into(),
        price,
        qty,
        exchange: "UPBIT".into(),
    })
}

#[test]
fn empty_wal_recovery_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::open(dir.path().join("events.db")).unwrap();
    let mut seq = Sequencer::new(Arc::new(EventPool::new())).with_store(store);

    seq.recover_from_wal().unwrap();
    assert_eq!(seq.next_seq(), 1);
}

#[test]
fn single_event_replay_reproduces_the_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("events.db");

    // Live sequencer A processes one event through the WAL.
    let (live_price, live_next_seq) = {
        let store = EventStore::open(&db).unwrap();
        let mut a = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
        a.process_event(market_event(1, "BTC", 134_109_000_000_000, 12_345_678))
            .unwrap();
        (
            a.snapshot_market_state("BTC").unwrap().price,
            a.next_seq(),
        )
    };

    // Fresh sequencer B recovers from the same WAL.
    let store = EventStore::open(&db).unwrap();
    let mut b = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
    b.recover_from_wal().unwrap();

    assert_eq!(b.snapshot_market_state("BTC").unwrap().price, live_price);
    assert_eq!(b.next_seq(), live_next_seq);
    assert_eq!(b.next_seq(), 2);
}

#[test]
fn replay_of_a_full_session_matches_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("events.db");

    let live_markets = {
        let store = EventStore::open(&db).unwrap();
        let mut live = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
        let prices = [100, 140, 90, 210, 180, 220, 160];
        for (i, price) in prices.into_iter().enumerate() {
            let sym = if i % 2 == 0 { "BTC" } else { "ETH" };
            live.process_event(market_event(i as u64 + 1, sym, price, i as i64))
                .unwrap();
        }
        live.market_view().all()
    };

    let store = EventStore::open(&db).unwrap();
    let mut replayed = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
    replayed.recover_from_wal().unwrap();

    assert_eq!(replayed.market_view().all(), live_markets);
    assert_eq!(replayed.next_seq(), 8);
}

#[test]
fn tolerated_gap_in_the_log_is_carried_on_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("events.db");

    {
        let store = EventStore::open(&db).unwrap();
        let mut live = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
        live.process_event(market_event(1, "BTC", 100, 1)).unwrap();
        live.process_event(market_event(2, "BTC", 110, 1)).unwrap();
        // Gap of 3, tolerated live, lands in the WAL as id 5.
        live.process_event(market_event(5, "BTC", 120, 1)).unwrap();
        assert_eq!(live.next_seq(), 6);
    }

    let store = EventStore::open(&db).unwrap();
    let mut replayed = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
    replayed.recover_from_wal().unwrap();

    assert_eq!(replayed.next_seq(), 6);
    assert_eq!(replayed.snapshot_market_state("BTC").unwrap().price, 120);
}

#[test]
fn snapshot_skips_the_replayed_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("events.db");
    let snap_dir = dir.path().join("snapshots");

    {
        let store = EventStore::open(&db).unwrap();
        let snapshots = SnapshotManager::new(&snap_dir);
        // Checkpoint every 2 events.
        let mut live = Sequencer::new(Arc::new(EventPool::new()))
            .with_store(store)
            .with_snapshots(snapshots, 2);
        for i in 1..=5u64 {
            live.process_event(market_event(i, "BTC", i as i64 * 100, 1))
                .unwrap();
        }
    }

    let store = EventStore::open(&db).unwrap();
    let snapshots = SnapshotManager::new(&snap_dir);
    let mut recovered = Sequencer::new(Arc::new(EventPool::new()))
        .with_store(store)
        .with_snapshots(snapshots, 2);
    recovered.recover_from_wal().unwrap();

    assert_eq!(recovered.next_seq(), 6);
    assert_eq!(recovered.snapshot_market_state("BTC").unwrap().price, 500);
}
