//! The single-writer event processor.
//!
//! Exactly one task calls [`Sequencer::run`]; it owns the markets map, the
//! balance book and the `next_seq` cursor for the lifetime of the session.
//! Everything reaches it through the bounded inbox, and every accepted
//! event is durably in the WAL before any state changes.
//!
//! Live processing and recovery share [`Sequencer::dispatch`]: replaying
//! the log through the identical code path reproduces the same state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use seqtape_models::{
    split_symbol, Balance, BalanceBook, BalanceUpdate, Event, EventPool, MarketState, MarketUpdate,
    Order, OrderStatus, OrderUpdate, Side,
};
use seqtape_quant::{checked, QTY_SCALE};
use seqtape_store::{EventStore, Snapshot, SnapshotManager};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::FatalError;
use crate::execution::Execution;
use crate::strategy::{Strategy, MAX_STRATEGY_ORDERS};

/// Largest tolerated forward jump in live sequence ids.
pub const SEQUENCE_GAP_TOLERANCE: u64 = 10;

const DEFAULT_INBOX_CAPACITY: usize = 1024;
const DEFAULT_SNAPSHOT_KEEP: usize = 3;
const DEFAULT_QUOTE: &str = "KRW";

type SharedMarkets = Arc<RwLock<HashMap<String, MarketState>>>;
type StateCallback = Box<dyn FnMut(MarketState) + Send>;

/// Outcome of live sequence validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    Proceed,
    /// Duplicate or old event: drop without persisting or dispatching.
    Ignore,
}

/// Read-only handle over the markets map for UI threads and tests.
#[derive(Clone)]
pub struct MarketView {
    markets: SharedMarkets,
}

impl MarketView {
    /// Value copy of one market's state.
    pub fn get(&self, symbol: &str) -> Option<MarketState> {
        self.markets
            .read()
            .expect("markets lock poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn all(&self) -> HashMap<String, MarketState> {
        self.markets.read().expect("markets lock poisoned").clone()
    }
}

#[derive(Serialize)]
struct StateDump {
    next_seq: u64,
    markets: HashMap<String, MarketState>,
    balances: std::collections::BTreeMap<String, Balance>,
}

pub struct Sequencer {
    inbox_tx: mpsc::Sender<Event>,
    inbox_rx: mpsc::Receiver<Event>,
    markets: SharedMarkets,
    balances: BalanceBook,
    orders: HashMap<String, Order>,
    next_seq: u64,
    store: Option<EventStore>,
    snapshots: Option<SnapshotManager>,
    snapshot_interval: u64,
    snapshot_keep: usize,
    strategy: Option<Box<dyn Strategy>>,
    execution: Option<Box<dyn Execution>>,
    on_state_update: Option<StateCallback>,
    pool: Arc<EventPool>,
    order_buf: Vec<Order>,
    default_quote: String,
    dump_path: PathBuf,
}

impl Sequencer {
    pub fn new(pool: Arc<EventPool>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        Self {
            inbox_tx,
            inbox_rx,
            markets: Arc::new(RwLock::new(HashMap::new())),
            balances: BalanceBook::new(),
            orders: HashMap::new(),
            next_seq: 1,
            store: None,
            snapshots: None,
            snapshot_interval: 0,
            snapshot_keep: DEFAULT_SNAPSHOT_KEEP,
            strategy: None,
            execution: None,
            on_state_update: None,
            pool,
            order_buf: vec![Order::default(); MAX_STRATEGY_ORDERS],
            default_quote: DEFAULT_QUOTE.to_string(),
            dump_path: PathBuf::from("panic_dump.json"),
        }
    }

    /// Enable WAL-first persistence.
    pub fn with_store(mut self, store: EventStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable periodic checkpoints every `interval` processed events.
    pub fn with_snapshots(mut self, manager: SnapshotManager, interval: u64) -> Self {
        self.snapshots = Some(manager);
        self.snapshot_interval = interval;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Wire the execution side. Call after [`Self::recover_from_wal`] so
    /// replayed strategy signals are not re-submitted to the venue.
    pub fn set_execution(&mut self, execution: Box<dyn Execution>) {
        self.execution = Some(execution);
    }

    /// Observe state changes with a value copy of the updated market.
    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.on_state_update = Some(callback);
        self
    }

    pub fn with_default_quote(mut self, quote: impl Into<String>) -> Self {
        self.default_quote = quote.into();
        self
    }

    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = path.into();
        self
    }

    /// Producer endpoint of the bounded inbox; clone freely.
    pub fn inbox(&self) -> mpsc::Sender<Event> {
        self.inbox_tx.clone()
    }

    /// Read handle usable from any thread.
    pub fn market_view(&self) -> MarketView {
        MarketView {
            markets: Arc::clone(&self.markets),
        }
    }

    /// Value copy of one market's state (external read).
    pub fn snapshot_market_state(&self, symbol: &str) -> Option<MarketState> {
        self.markets
            .read()
            .expect("markets lock poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn balances_snapshot(&self) -> std::collections::BTreeMap<String, Balance> {
        self.balances.snapshot()
    }

    pub fn orders_snapshot(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        orders
    }

    /// The main event loop. Must run on exactly one task; loops until the
    /// cancel signal fires or a fatal fault halts the core.
    pub async fn run(&mut self, mut cancel: watch::Receiver<bool>) -> Result<(), FatalError> {
        info!("sequencer started (single-writer hotpath)");
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    info!("sequencer stopping");
                    return Ok(());
                }
                ev = self.inbox_rx.recv() => {
                    let Some(ev) = ev else {
                        info!("inbox closed, sequencer stopping");
                        return Ok(());
                    };
                    if let Err(fault) = self.process_event(ev) {
                        self.halt(&fault);
                        return Err(fault);
                    }
                }
            }
        }
    }

    /// Drain whatever is already queued without blocking. Replay tooling
    /// and tests drive the loop this way.
    pub fn process_pending(&mut self) -> Result<usize, FatalError> {
        let mut processed = 0;
        while let Ok(ev) = self.inbox_rx.try_recv() {
            self.process_event(ev)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Live processing of one event: validate, persist, dispatch, advance.
    pub fn process_event(&mut self, ev: Event) -> Result<(), FatalError> {
        match self.validate_sequence(ev.seq())? {
            SeqCheck::Ignore => {
                self.recycle(ev);
                return Ok(());
            }
            SeqCheck::Proceed => {}
        }

        // WAL-first: the event must be durable before any mutation.
        if let Some(store) = &self.store {
            store.append(&ev)?;
        }

        self.dispatch(ev)?;
        self.next_seq += 1;
        self.maybe_snapshot();
        Ok(())
    }

    /// Deterministic dispatch without WAL append: recovery and tests only.
    /// Replay has no gap tolerance; any mismatch is fatal.
    pub fn replay_event(&mut self, ev: Event) -> Result<(), FatalError> {
        if ev.seq() != self.next_seq {
            let fault = FatalError::ReplayMismatch {
                expected: self.next_seq,
                got: ev.seq(),
            };
            self.recycle(ev);
            return Err(fault);
        }
        self.dispatch(ev)?;
        self.next_seq += 1;
        Ok(())
    }

    /// Restore state from the latest snapshot plus the WAL tail.
    pub fn recover_from_wal(&mut self) -> Result<(), FatalError> {
        let Some(store) = self.store.as_ref() else {
            info!("no store configured, starting fresh");
            return Ok(());
        };

        let last = store.last_seq()?;
        if last == 0 {
            info!("WAL is empty, starting fresh");
            return Ok(());
        }

        if let Some(snapshots) = &self.snapshots {
            match snapshots.load_latest() {
                Ok(Some(snap)) => {
                    let seq = snap.seq;
                    *self.markets.write().expect("markets lock poisoned") = snap.markets;
                    self.balances.restore(snap.balances);
                    self.orders = snap
                        .open_orders
                        .into_iter()
                        .map(|order| (order.id.clone(), order))
                        .collect();
                    self.next_seq = seq + 1;
                    info!(seq, "snapshot installed");
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "snapshot load failed, replaying full WAL"),
            }
        }

        let events = store.load_events(self.next_seq)?;
        info!(count = events.len(), from_seq = self.next_seq, "replaying WAL");

        for ev in events {
            // A forward jump recorded in the log was tolerated at capture
            // time; carry it instead of failing strict replay.
            if ev.seq() > self.next_seq {
                warn!(expected = self.next_seq, got = ev.seq(), "REPLAY_GAP_CARRIED");
                self.next_seq = ev.seq();
            }
            self.replay_event(ev)?;
        }

        info!(next_seq = self.next_seq, "state recovered from WAL");
        Ok(())
    }

    /// Serialize `{next_seq, markets, balances}` for post-mortems.
    pub fn dump_state(&self, path: &Path) -> anyhow::Result<()> {
        let dump = StateDump {
            next_seq: self.next_seq,
            markets: self.markets.read().expect("markets lock poisoned").clone(),
            balances: self.balances.snapshot(),
        };
        let data = serde_json::to_vec_pretty(&dump)?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), "state dumped");
        Ok(())
    }

    /// Live sequence policy: duplicates are ignored, small forward gaps are
    /// tolerated by fast-forwarding, large gaps halt.
    fn validate_sequence(&mut self, seq: u64) -> Result<SeqCheck, FatalError> {
        let expected = self.next_seq;
        if seq == expected {
            return Ok(SeqCheck::Proceed);
        }

        if seq < expected {
            warn!(expected, got = seq, "SEQUENCE_DUPLICATE_IGNORED");
            return Ok(SeqCheck::Ignore);
        }

        let gap = seq - expected;
        if gap <= SEQUENCE_GAP_TOLERANCE {
            // Small WebSocket gaps happen; availability beats halting.
            // TODO: trigger a state resync here once the execution phase
            // defines one.
            warn!(expected, got = seq, gap, "SEQUENCE_GAP_TOLERATED");
            self.next_seq = seq;
            return Ok(SeqCheck::Proceed);
        }

        error!(expected, got = seq, gap, "SEQUENCE_GAP_FATAL");
        Err(FatalError::SequenceGap { expected, got: seq })
    }

    /// Apply one event to in-memory state. Shared verbatim by the live path
    /// and replay.
    fn dispatch(&mut self, ev: Event) -> Result<(), FatalError> {
        match ev {
            Event::MarketUpdate(update) => {
                let result = self.apply_market_update(&update);
                self.pool.release(update);
                result
            }
            Event::OrderUpdate(update) => self.apply_order_update(&update),
            Event::BalanceUpdate(update) => self.apply_balance_update(&update),
            Event::SystemHalt(halt) => {
                warn!(seq = halt.seq, reason = %halt.reason, "system halt event (reserved)");
                Ok(())
            }
        }
    }

    fn apply_market_update(&mut self, ev: &MarketUpdate) -> Result<(), FatalError> {
        let state = {
            let mut markets = self.markets.write().expect("markets lock poisoned");
            let entry = markets
                .entry(ev.symbol.clone())
                .or_insert_with(|| MarketState::new(ev.symbol.clone()));
            entry.price = ev.price;
            entry.total_qty = ev.qty;
            entry.last_update = ev.ts;
            entry.clone()
        };

        if let Some(execution) = self.execution.as_mut() {
            execution.update_price(&state.symbol, state.price);
        }

        if let Some(strategy) = self.strategy.as_mut() {
            let produced = strategy
                .on_market_update(&state, &mut self.order_buf)
                .map_err(|e| FatalError::Strategy(e.to_string()))?;
            let produced = produced.min(self.order_buf.len());

            for i in 0..produced {
                let mut order = std::mem::take(&mut self.order_buf[i]);
                order.id = format!("ord-{}-{}", ev.seq, i);
                order.created_ts = ev.ts;
                info!(
                    id = %order.id,
                    symbol = %order.symbol,
                    side = ?order.side,
                    order_type = ?order.order_type,
                    price = order.price,
                    qty = order.qty,
                    "STRATEGY_ACTION"
                );

                if let Some(execution) = self.execution.as_mut() {
                    if let Err(e) = execution.submit(&order) {
                        warn!(id = %order.id, error = %e, "order rejected by execution");
                        order.status = OrderStatus::Canceled;
                    }
                }
                self.orders.insert(order.id.clone(), order);
            }
        }

        if let Some(callback) = self.on_state_update.as_mut() {
            callback(state);
        }
        Ok(())
    }

    fn apply_order_update(&mut self, ev: &OrderUpdate) -> Result<(), FatalError> {
        let Some(order) = self.orders.get_mut(&ev.order_id) else {
            warn!(order_id = %ev.order_id, status = ?ev.status, "order update for unknown order");
            return Ok(());
        };

        let prev = order.status;
        order.status = ev.status;
        let order = order.clone();

        if ev.status == OrderStatus::Filled && prev != OrderStatus::Filled {
            let price = if ev.price > 0 { ev.price } else { order.price };
            let qty = if ev.qty > 0 { ev.qty } else { order.qty };
            let (base, quote) = split_symbol(&order.symbol, &self.default_quote);
            let quote_amount = checked::mul_div(price, qty, QTY_SCALE)?;

            match order.side {
                Side::Buy => {
                    self.balances.get_mut(quote).debit(quote_amount, ev.seq)?;
                    self.balances.get_mut(base).credit(qty, ev.seq)?;
                }
                Side::Sell => {
                    self.balances.get_mut(base).debit(qty, ev.seq)?;
                    self.balances.get_mut(quote).credit(quote_amount, ev.seq)?;
                }
            }
            info!(
                id = %order.id,
                symbol = %order.symbol,
                side = ?order.side,
                price,
                qty,
                "fill applied to balances"
            );
        }

        if let Some(strategy) = self.strategy.as_mut() {
            strategy.on_order_update(&order);
        }
        Ok(())
    }

    fn apply_balance_update(&mut self, ev: &BalanceUpdate) -> Result<(), FatalError> {
        let balance = self.balances.get_mut(&ev.symbol);
        if ev.delta >= 0 {
            balance.credit(ev.delta, ev.seq)?;
        } else {
            let amount = checked::sub(0, ev.delta)?;
            balance.debit(amount, ev.seq)?;
        }
        info!(symbol = %ev.symbol, delta = ev.delta, "balance delta applied");
        Ok(())
    }

    fn maybe_snapshot(&mut self) {
        if self.snapshot_interval == 0 {
            return;
        }
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        let processed = self.next_seq.saturating_sub(1);
        if processed == 0 || processed % self.snapshot_interval != 0 {
            return;
        }

        let mut open_orders: Vec<Order> = self
            .orders
            .values()
            .filter(|order| order.is_open())
            .cloned()
            .collect();
        open_orders.sort_by(|a, b| a.id.cmp(&b.id));

        let snap = Snapshot {
            seq: processed,
            ts_unix: Utc::now().timestamp(),
            markets: self.markets.read().expect("markets lock poisoned").clone(),
            balances: self.balances.snapshot(),
            open_orders,
        };
        if let Err(e) = snapshots.save(&snap) {
            warn!(error = %e, "snapshot save failed");
            return;
        }
        if let Err(e) = snapshots.cleanup(self.snapshot_keep) {
            warn!(error = %e, "snapshot cleanup failed");
        }
    }

    /// Crash protocol: verify the book, dump state, let the caller re-raise.
    fn halt(&mut self, fault: &FatalError) {
        error!(fault = %fault, "CRITICAL_FAULT, halting");
        if let Err(e) = self.balances.verify_all() {
            error!(error = %e, "balance book failed verification during halt");
        }
        let dump_path = self.dump_path.clone();
        if let Err(e) = self.dump_state(&dump_path) {
            error!(error = %e, "state dump failed");
        }
    }

    fn recycle(&self, ev: Event) {
        if let Event::MarketUpdate(update) = ev {
            self.pool.release(update);
        }
    }
}
