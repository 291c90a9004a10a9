//! Order execution, venue side.
//!
//! Execution is outside the deterministic core: it receives orders from the
//! dispatch path and reports lifecycle transitions back as ordinary
//! sequenced `OrderUpdate` events through the inbox, so fills live in the
//! WAL stream and replay reconstructs balances without the venue.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use seqtape_models::{
    split_symbol, BalanceBook, Event, Order, OrderStatus, OrderType, OrderUpdate, Side,
};
use seqtape_quant::checked;
use seqtape_quant::{PriceMicros, QtySats, SeqCounter, QTY_SCALE};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Trading mode selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Paper,
    Demo,
    Real,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Demo => "demo",
            TradingMode::Real => "real",
        }
    }
}

impl FromStr for TradingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "demo" => Ok(TradingMode::Demo),
            "real" => Ok(TradingMode::Real),
            other => bail!("unknown trading mode: {other}"),
        }
    }
}

/// The order-execution contract consumed by the sequencer.
pub trait Execution: Send {
    /// Latest market price, fed from the dispatch path.
    fn update_price(&mut self, _symbol: &str, _price: PriceMicros) {}

    /// Fund the venue-side account, where the venue supports it.
    fn deposit(&mut self, _symbol: &str, _amount: QtySats) -> Result<()> {
        bail!("deposits not supported by this executor")
    }

    /// Send a new order to the venue. A rejection is an ordinary error, not
    /// a fault.
    fn submit(&mut self, order: &Order) -> Result<()>;

    /// Cancel an open order by id.
    fn cancel(&mut self, order_id: &str) -> Result<()>;
}

/// A simulated fill.
#[derive(Debug, Clone)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: PriceMicros,
    pub qty: QtySats,
    pub ts: i64,
}

/// Paper trading: immediate fills against a virtual venue-side account.
///
/// The internal balance book models the exchange's view; the core's own
/// book is rebuilt from the `OrderUpdate` events this executor emits.
pub struct PaperExecution {
    balances: BalanceBook,
    orders: HashMap<String, Order>,
    prices: HashMap<String, PriceMicros>,
    fills: Vec<Fill>,
    default_quote: String,
    events: mpsc::Sender<Event>,
    seq: Arc<SeqCounter>,
}

impl PaperExecution {
    pub fn new(
        default_quote: impl Into<String>,
        events: mpsc::Sender<Event>,
        seq: Arc<SeqCounter>,
    ) -> Self {
        Self {
            balances: BalanceBook::new(),
            orders: HashMap::new(),
            prices: HashMap::new(),
            fills: Vec::new(),
            default_quote: default_quote.into(),
            events,
            seq,
        }
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    fn emit(&self, update: OrderUpdate) {
        if self.events.try_send(Event::OrderUpdate(update)).is_err() {
            warn!("inbox full, paper fill event dropped");
        }
    }
}

impl Execution for PaperExecution {
    fn update_price(&mut self, symbol: &str, price: PriceMicros) {
        self.prices.insert(symbol.to_string(), price);
    }

    /// Fund the virtual account. Mirror the same amount into the core via a
    /// `BalanceUpdate` event so both books agree.
    fn deposit(&mut self, symbol: &str, amount: QtySats) -> Result<()> {
        self.balances
            .get_mut(symbol)
            .credit(amount, 0)
            .with_context(|| format!("paper deposit {symbol}"))?;
        Ok(())
    }

    fn submit(&mut self, order: &Order) -> Result<()> {
        let exec_price = match order.order_type {
            OrderType::Market => match self.prices.get(&order.symbol) {
                Some(price) => *price,
                None if order.price > 0 => order.price,
                None => bail!("no price available for {}", order.symbol),
            },
            OrderType::Limit => order.price,
        };
        if exec_price <= 0 {
            bail!("non-positive execution price for {}", order.symbol);
        }

        let (base, quote) = split_symbol(&order.symbol, &self.default_quote);
        let quote_amount = checked::mul_div(exec_price, order.qty, QTY_SCALE)
            .map_err(|e| anyhow!("fill arithmetic: {e}"))?;

        match order.side {
            Side::Buy => {
                let available = self.balances.get_mut(quote).available_sats();
                if available < quote_amount {
                    bail!("insufficient {quote}: need {quote_amount}, have {available}");
                }
                self.balances.get_mut(quote).debit(quote_amount, 0)?;
                self.balances.get_mut(base).credit(order.qty, 0)?;
            }
            Side::Sell => {
                let available = self.balances.get_mut(base).available_sats();
                if available < order.qty {
                    bail!("insufficient {base}: need {}, have {available}", order.qty);
                }
                self.balances.get_mut(base).debit(order.qty, 0)?;
                self.balances.get_mut(quote).credit(quote_amount, 0)?;
            }
        }

        let ts = Utc::now().timestamp_micros();
        self.fills.push(Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            price: exec_price,
            qty: order.qty,
            ts,
        });

        let mut filled = order.clone();
        filled.status = OrderStatus::Filled;
        self.orders.insert(filled.id.clone(), filled);

        info!(
            id = %order.id,
            symbol = %order.symbol,
            side = ?order.side,
            price = exec_price,
            qty = order.qty,
            "paper fill"
        );

        self.emit(OrderUpdate {
            seq: self.seq.next(),
            ts,
            order_id: order.id.clone(),
            status: OrderStatus::Filled,
            price: exec_price,
            qty: order.qty,
        });
        Ok(())
    }

    fn cancel(&mut self, order_id: &str) -> Result<()> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| anyhow!("order not found: {order_id}"))?;
        if order.status == OrderStatus::Filled {
            bail!("cannot cancel filled order: {order_id}");
        }
        order.status = OrderStatus::Canceled;
        info!(id = %order_id, "paper cancel");

        self.emit(OrderUpdate {
            seq: self.seq.next(),
            ts: Utc::now().timestamp_micros(),
            order_id: order_id.to_string(),
            status: OrderStatus::Canceled,
            price: 0,
            qty: 0,
        });
        Ok(())
    }
}

/// Skeleton executor for venues that are not wired yet: logs and drops.
pub struct NullExecution {
    venue: &'static str,
}

impl NullExecution {
    pub fn new(venue: &'static str) -> Self {
        Self { venue }
    }
}

impl Execution for NullExecution {
    fn submit(&mut self, order: &Order) -> Result<()> {
        warn!(
            venue = self.venue,
            id = %order.id,
            symbol = %order.symbol,
            "execution not wired, order dropped"
        );
        Ok(())
    }

    fn cancel(&mut self, order_id: &str) -> Result<()> {
        warn!(venue = self.venue, id = %order_id, "execution not wired, cancel dropped");
        Ok(())
    }
}

/// Environment latch required before any real-money connection is opened.
pub const REAL_MONEY_ENV: &str = "CONFIRM_REAL_MONEY";

/// Build the executor for a trading mode.
///
/// `real` refuses to construct unless `CONFIRM_REAL_MONEY=true` is present
/// in the environment; the check runs before anything opens an outbound
/// connection.
pub fn build_execution(
    mode: TradingMode,
    default_quote: &str,
    events: mpsc::Sender<Event>,
    seq: Arc<SeqCounter>,
) -> Result<Box<dyn Execution>> {
    info!(mode = mode.as_str(), "initializing execution");
    match mode {
        TradingMode::Paper => Ok(Box::new(PaperExecution::new(default_quote, events, seq))),
        TradingMode::Demo => {
            info!("demo mode: simulated fills against testnet semantics");
            Ok(Box::new(PaperExecution::new(default_quote, events, seq)))
        }
        TradingMode::Real => {
            if std::env::var(REAL_MONEY_ENV).as_deref() != Ok("true") {
                bail!("SAFETY_GUARD: real trading requires {REAL_MONEY_ENV}=true");
            }
            warn!("REAL trading mode armed");
            Ok(Box::new(NullExecution::new("real")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper() -> (PaperExecution, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(16);
        let exec = PaperExecution::new("KRW", tx, Arc::new(SeqCounter::new()));
        (exec, rx)
    }

    fn order(side: Side, qty: QtySats) -> Order {
        Order {
            id: "ord-1-0".into(),
            symbol: "BTC".into(),
            side,
            order_type: OrderType::Market,
            price: 0,
            qty,
            status: OrderStatus::New,
            created_ts: 0,
        }
    }

    #[test]
    fn market_buy_fills_at_last_price_and_emits_update() {
        let (mut exec, mut rx) = paper();
        exec.deposit("KRW", 1_000_000_000_000).unwrap();
        exec.update_price("BTC", 100_000_000_000); // 100k KRW in micros

        exec.submit(&order(Side::Buy, 10_000)).unwrap();

        // 100_000_000_000 * 10_000 / 1e8 = 10_000_000 quote units spent.
        assert_eq!(exec.fills().len(), 1);
        assert_eq!(exec.fills()[0].price, 100_000_000_000);

        let Event::OrderUpdate(update) = rx.try_recv().unwrap() else {
            panic!("expected order update");
        };
        assert_eq!(update.order_id, "ord-1-0");
        assert_eq!(update.status, OrderStatus::Filled);
        assert_eq!(update.qty, 10_000);
        assert_eq!(update.seq, 1);
    }

    #[test]
    fn insufficient_funds_is_a_rejection_not_a_fill() {
        let (mut exec, mut rx) = paper();
        exec.update_price("BTC", 100_000_000_000);

        assert!(exec.submit(&order(Side::Buy, 10_000)).is_err());
        assert!(exec.fills().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sell_without_holdings_is_rejected() {
        let (mut exec, _rx) = paper();
        exec.update_price("BTC", 100_000_000_000);
        assert!(exec.submit(&order(Side::Sell, 10_000)).is_err());
    }

    #[test]
    fn market_order_without_any_price_is_rejected() {
        let (mut exec, _rx) = paper();
        exec.deposit("KRW", 1_000_000_000_000).unwrap();
        assert!(exec.submit(&order(Side::Buy, 10_000)).is_err());
    }

    #[test]
    fn cancel_rejects_filled_orders() {
        let (mut exec, _rx) = paper();
        exec.deposit("KRW", 1_000_000_000_000).unwrap();
        exec.update_price("BTC", 100_000_000_000);
        exec.submit(&order(Side::Buy, 10_000)).unwrap();
        assert!(exec.cancel("ord-1-0").is_err());
        assert!(exec.cancel("missing").is_err());
    }

    #[test]
    fn unknown_mode_string_is_an_error() {
        assert!("paper".parse::<TradingMode>().is_ok());
        assert!("REAL".parse::<TradingMode>().is_ok());
        assert!("mainnet".parse::<TradingMode>().is_err());
    }
}
