//! End-to-end paper flow: market ticks drive the SMA strategy, the paper
//! executor fills, and the fill re-enters the core as a sequenced
//! `OrderUpdate` that moves the balance book - all of it in the WAL, so a
//! fresh sequencer rebuilds identical balances from the log alone.

use std::sync::Arc;

use seqtape_engine::{Execution, PaperExecution, Sequencer, SmaCrossStrategy};
use seqtape_models::{BalanceUpdate, Event, EventPool, MarketUpdate, OrderStatus};
use seqtape_quant::SeqCounter;
use seqtape_store::EventStore;

fn market_event(seq: u64, price: i64) -> Event {
    Event::MarketUpdate(MarketUpdate {
        seq,
        ts: 1_704_067_200_000_000 + seq as i64,
        symbol: "BTC".into(),
        price,
        qty: 1,
        exchange: "UPBIT".into(),
    })
}

#[test]
fn golden_cross_fill_moves_balances_and_replays_identically() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("events.db");

    let counter = Arc::new(SeqCounter::new());
    let store = EventStore::open(&db).unwrap();
    let mut seq = Sequencer::new(Arc::new(EventPool::new()))
        .with_store(store)
        .with_strategy(Box::new(SmaCrossStrategy::new("BTC", 3, 5).unwrap()));

    const DEPOSIT: i64 = 100_000_000;
    // 100k and 200k quote units, in micros.
    const FLAT: i64 = 100_000_000_000;
    const JUMP: i64 = 200_000_000_000;

    let mut exec = PaperExecution::new("KRW", seq.inbox(), Arc::clone(&counter));
    exec.deposit("KRW", DEPOSIT).unwrap();
    seq.set_execution(Box::new(exec));

    // Seed the core book with the same deposit, as a sequenced event.
    let sender = seq.inbox();
    sender
        .try_send(Event::BalanceUpdate(BalanceUpdate {
            seq: counter.next(),
            ts: 0,
            symbol: "KRW".into(),
            delta: DEPOSIT,
        }))
        .unwrap();
    seq.process_pending().unwrap();

    // Five flat ticks, then the jump that fires the golden cross.
    for price in [FLAT, FLAT, FLAT, FLAT, FLAT, JUMP] {
        sender.try_send(market_event(counter.next(), price)).unwrap();
    }
    seq.process_pending().unwrap();
    // The fill event the executor pushed during the last tick is queued;
    // drain it too.
    seq.process_pending().unwrap();

    let orders = seq.orders_snapshot();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Filled);
    assert_eq!(orders[0].qty, 10_000);

    let balances = seq.balances_snapshot();
    // BUY 10_000 sats at 200k: quote spent = JUMP * 10_000 / 1e8.
    assert_eq!(balances["BTC"].amount_sats, 10_000);
    assert_eq!(balances["KRW"].amount_sats, DEPOSIT - 20_000_000);

    let live_balances = balances;
    let live_next = seq.next_seq();
    drop(seq);

    // A fresh sequencer rebuilds the same state from the WAL alone: the
    // deposit, the ticks and the fill are all in the log.
    let store = EventStore::open(&db).unwrap();
    let mut replayed = Sequencer::new(Arc::new(EventPool::new()))
        .with_store(store)
        .with_strategy(Box::new(SmaCrossStrategy::new("BTC", 3, 5).unwrap()));
    replayed.recover_from_wal().unwrap();

    assert_eq!(replayed.next_seq(), live_next);
    assert_eq!(replayed.balances_snapshot(), live_balances);
    assert_eq!(
        replayed.snapshot_market_state("BTC").unwrap().price,
        200_000_000_000
    );
}
