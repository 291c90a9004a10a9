//! Startup orchestration.
//!
//! Order matters here: configuration and logging first, then the workspace
//! and the instance lock, then the store and recovery, and only after
//! recovery the execution side and the outbound connections. The
//! real-money guard runs inside `build_execution`, before anything dials
//! out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use seqtape_engine::{build_execution, Sequencer, SmaCrossStrategy, TradingMode};
use seqtape_gateway::{
    bitget::BitgetSpotGateway, fxrate::FxRatePoller, upbit::UpbitGateway, EventTx, WsConfig,
    WsWorker,
};
use seqtape_models::{BalanceUpdate, Event, EventPool};
use seqtape_quant::fixed_point::{price_to_display, qty_to_display};
use seqtape_quant::SeqCounter;
use seqtape_store::{EventStore, SnapshotManager};

use crate::config::Config;
use crate::{assets, logging, paths, secrets};

const POOL_WARMUP: usize = 256;

struct Workspace {
    data_dir: PathBuf,
    log_dir: PathBuf,
    root: PathBuf,
}

fn prepare_workspace(mode: TradingMode) -> Result<Workspace> {
    let root = paths::workspace_dir();
    let data_dir = root.join("data").join(mode.as_str());
    let log_dir = root.join("logs").join(mode.as_str());
    paths::ensure_dir(&data_dir)?;
    paths::ensure_dir(&log_dir)?;
    Ok(Workspace {
        data_dir,
        log_dir,
        root,
    })
}

fn load_config(config_path: Option<PathBuf>) -> Result<(Config, TradingMode)> {
    let config_path = config_path.unwrap_or_else(paths::resolve_config_path);
    let mut cfg = Config::load(&config_path)?;
    let mode: TradingMode = cfg.trading.mode.parse()?;

    // Demo/real credentials live in a separate per-mode file when present.
    if matches!(mode, TradingMode::Demo | TradingMode::Real) {
        let secrets_path = PathBuf::from("secrets").join(format!("{}.toml", mode.as_str()));
        if secrets_path.exists() {
            let file_secrets = secrets::load_secret_config(&secrets_path)?;
            secrets::apply(&mut cfg, &file_secrets);
        }
    }
    Ok((cfg, mode))
}

/// `seqtape run`
pub async fn run_live(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, mode) = load_config(config_path)?;
    let ws = prepare_workspace(mode)?;
    let _log_guard = logging::init(&ws.log_dir, &cfg.logging.level)?;

    info!(
        app = %cfg.app.name,
        version = %cfg.app.version,
        mode = mode.as_str(),
        workspace = %ws.root.display(),
        "starting"
    );

    let _lock = paths::InstanceLock::acquire(&ws.root)?;

    let store = EventStore::open(ws.data_dir.join("events.db")).context("open event store")?;
    assets::sync_symbols(&store, &cfg.all_symbols())?;

    let last_seq = store.last_seq()?;
    let counter = Arc::new(SeqCounter::new());
    counter.resume_from(last_seq);

    let pool = Arc::new(EventPool::new());
    pool.warmup(POOL_WARMUP);

    let mut sequencer = Sequencer::new(Arc::clone(&pool))
        .with_store(store)
        .with_snapshots(
            SnapshotManager::new(ws.data_dir.join("snapshots")),
            cfg.engine.snapshot_interval,
        )
        .with_default_quote(cfg.trading.quote_symbol.clone())
        .with_dump_path(ws.data_dir.join("panic_dump.json"));

    if let Some(sc) = &cfg.strategy {
        let strategy = SmaCrossStrategy::new(&sc.symbol, sc.short_period, sc.long_period)
            .context("construct strategy")?;
        sequencer = sequencer.with_strategy(Box::new(strategy));
        info!(
            symbol = %sc.symbol,
            short = sc.short_period,
            long = sc.long_period,
            "sma-cross strategy armed"
        );
    }

    sequencer.recover_from_wal()?;

    // Execution is wired only after recovery: replayed strategy signals
    // must not reach the venue a second time.
    let mut execution = build_execution(
        mode,
        &cfg.trading.quote_symbol,
        sequencer.inbox(),
        Arc::clone(&counter),
    )?;

    if matches!(mode, TradingMode::Paper | TradingMode::Demo) {
        let balances = sequencer.balances_snapshot();
        if balances.is_empty() {
            if cfg.trading.paper_deposit > 0 {
                execution.deposit(&cfg.trading.quote_symbol, cfg.trading.paper_deposit)?;
                sequencer
                    .inbox()
                    .try_send(Event::BalanceUpdate(BalanceUpdate {
                        seq: counter.next(),
                        ts: Utc::now().timestamp_micros(),
                        symbol: cfg.trading.quote_symbol.clone(),
                        delta: cfg.trading.paper_deposit,
                    }))
                    .ok();
                info!(
                    symbol = %cfg.trading.quote_symbol,
                    amount = cfg.trading.paper_deposit,
                    "initial paper deposit queued"
                );
            }
        } else {
            // Recovered session: mirror the core book into the fresh
            // venue-side account.
            for (symbol, balance) in &balances {
                if balance.amount_sats > 0 {
                    execution.deposit(symbol, balance.amount_sats)?;
                }
            }
            info!(count = balances.len(), "venue balances restored from core book");
        }
    }
    sequencer.set_execution(execution);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let event_tx = EventTx::new(sequencer.inbox(), Arc::clone(&pool));

    let mut workers = Vec::new();
    if !cfg.api.upbit.symbols.is_empty() {
        workers.push(WsWorker::spawn(
            UpbitGateway::new(
                cfg.api.upbit.ws_url.clone(),
                cfg.api.upbit.symbols.clone(),
                event_tx.clone(),
                Arc::clone(&counter),
            ),
            WsConfig::default(),
            cancel_rx.clone(),
        ));
        info!(symbols = cfg.api.upbit.symbols.len(), "upbit gateway started");
    }
    if !cfg.api.bitget.symbols.is_empty() {
        workers.push(WsWorker::spawn(
            BitgetSpotGateway::new(
                cfg.api.bitget.ws_url.clone(),
                cfg.api.bitget.symbols.clone(),
                event_tx.clone(),
                Arc::clone(&counter),
            ),
            WsConfig::default(),
            cancel_rx.clone(),
        ));
        info!(symbols = cfg.api.bitget.symbols.len(), "bitget spot gateway started");
    }

    let fx_task = if cfg.api.exchange_rate.url.is_empty() {
        None
    } else {
        Some(
            FxRatePoller::new(
                cfg.api.exchange_rate.url.clone(),
                Duration::from_secs(cfg.api.exchange_rate.poll_interval_sec.max(1)),
                event_tx.clone(),
                Arc::clone(&counter),
            )
            .spawn(cancel_rx.clone()),
        )
    };

    let mut seq_task = tokio::spawn(async move {
        let mut sequencer = sequencer;
        sequencer.run(cancel_rx).await
    });

    info!("system operational; ctrl-c to exit");

    let result = tokio::select! {
        res = &mut seq_task => {
            // The sequencer only returns on its own when it halted.
            warn!("sequencer exited, shutting everything down");
            res.context("sequencer task panicked")?.map_err(Into::into)
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    let _ = cancel_tx.send(true);
    for worker in workers {
        worker.stop().await;
    }
    if let Some(fx) = fx_task {
        let _ = fx.await;
    }
    if !seq_task.is_finished() {
        let _ = seq_task.await;
    }

    let dropped = event_tx.dropped();
    if dropped > 0 {
        warn!(dropped, "events were dropped on inbox overflow this session");
    }
    info!("goodbye");
    result
}

/// `seqtape replay` - rebuild state from the WAL through the same dispatch
/// path the live engine uses, then print what came back.
pub fn run_replay(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, mode) = load_config(config_path)?;
    let ws = prepare_workspace(mode)?;
    let _log_guard = logging::init(&ws.log_dir, &cfg.logging.level)?;
    let _lock = paths::InstanceLock::acquire(&ws.root)?;

    let db_path = ws.data_dir.join("events.db");
    let store = EventStore::open(&db_path).context("open event store")?;
    let last = store.last_seq()?;

    let mut sequencer = Sequencer::new(Arc::new(EventPool::new())).with_store(store);
    if let Some(sc) = &cfg.strategy {
        let strategy = SmaCrossStrategy::new(&sc.symbol, sc.short_period, sc.long_period)?;
        sequencer = sequencer.with_strategy(Box::new(strategy));
    }

    sequencer.recover_from_wal()?;

    println!("replayed {} ({} events)", db_path.display(), last);
    println!("next_seq: {}", sequencer.next_seq());

    let mut markets: Vec<_> = sequencer.market_view().all().into_values().collect();
    markets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    println!("markets:");
    for market in markets {
        println!(
            "  {:<10} price={} qty={} last_update={}",
            market.symbol,
            price_to_display(market.price),
            qty_to_display(market.total_qty),
            market.last_update,
        );
    }

    let balances = sequencer.balances_snapshot();
    if !balances.is_empty() {
        println!("balances:");
        for (symbol, balance) in balances {
            println!(
                "  {:<10} amount={} reserved={} (seq {})",
                symbol,
                balance.amount_sats,
                balance.reserved_sats,
                balance.last_update_seq,
            );
        }
    }

    let orders = sequencer.orders_snapshot();
    if !orders.is_empty() {
        println!("orders reconstructed: {}", orders.len());
    }
    Ok(())
}
