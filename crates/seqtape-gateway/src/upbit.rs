//! Upbit spot ticker adapter.
//!
//! Subscribes the `ticker` channel for `KRW-<symbol>` codes and converts
//! each tick into a pooled `MarketUpdate`. Prices arrive as JSON numbers;
//! they are re-parsed from their exact decimal text by the fixed-point
//! layer, never through a float.

use std::sync::Arc;

use seqtape_quant::fixed_point::{price_from_str, qty_from_str};
use seqtape_quant::SeqCounter;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::inbox::EventTx;
use crate::worker::{Gateway, Outbox};

pub const EXCHANGE: &str = "UPBIT";

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(rename = "type")]
    kind: String,
    /// Market code, e.g. "KRW-BTC".
    code: String,
    trade_price: Option<serde_json::Number>,
    acc_trade_volume_24h: Option<serde_json::Number>,
    /// Milliseconds.
    timestamp: Option<i64>,
}

pub struct UpbitGateway {
    ws_url: String,
    symbols: Vec<String>,
    tx: EventTx,
    seq: Arc<SeqCounter>,
}

impl UpbitGateway {
    pub fn new(ws_url: String, symbols: Vec<String>, tx: EventTx, seq: Arc<SeqCounter>) -> Self {
        Self {
            ws_url,
            symbols,
            tx,
            seq,
        }
    }
}

impl Gateway for UpbitGateway {
    fn id(&self) -> &str {
        EXCHANGE
    }

    fn endpoint(&self) -> String {
        self.ws_url.clone()
    }

    fn on_connect(&mut self, out: &mut Outbox) {
        let codes: Vec<String> = self.symbols.iter().map(|s| format!("KRW-{s}")).collect();
        let request = serde_json::json!([
            { "ticket": Uuid::new_v4().to_string() },
            { "type": "ticker", "codes": codes },
        ]);
        out.text(request.to_string());
    }

    fn on_message(&mut self, payload: &[u8]) {
        let msg: TickerMessage = match serde_json::from_slice(payload) {
            Ok(msg) => msg,
            Err(_) => return, // status frames, subscription acks
        };
        if msg.kind != "ticker" {
            return;
        }

        let symbol = msg.code.strip_prefix("KRW-").unwrap_or(&msg.code);

        let price = msg
            .trade_price
            .as_ref()
            .map(|n| price_from_str(&n.to_string()))
            .unwrap_or(Ok(0));
        let qty = msg
            .acc_trade_volume_24h
            .as_ref()
            .map(|n| qty_from_str(&n.to_string()))
            .unwrap_or(Ok(0));
        let (Ok(price), Ok(qty)) = (price, qty) else {
            debug!(code = %msg.code, "malformed ticker numerics, dropped");
            return;
        };

        let mut ev = self.tx.pool().acquire();
        ev.seq = self.seq.next();
        ev.ts = msg.timestamp.unwrap_or(0) * 1_000;
        ev.symbol.push_str(symbol);
        ev.price = price;
        ev.qty = qty;
        ev.exchange.push_str(EXCHANGE);
        self.tx.push_market(ev);
    }

    fn on_ping(&mut self, _out: &mut Outbox) {
        // Upbit keeps the connection alive on its own; the read timeout
        // handles a genuinely dead peer.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqtape_models::EventPool;
    use tokio::sync::mpsc;

    fn gateway(capacity: usize) -> (UpbitGateway, mpsc::Receiver<seqtape_models::Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        let pool = Arc::new(EventPool::new());
        let gw = UpbitGateway::new(
            "wss://api.upbit.com/websocket/v1".into(),
            vec!["BTC".into()],
            EventTx::new(tx, pool),
            Arc::new(SeqCounter::new()),
        );
        (gw, rx)
    }

    #[test]
    fn subscribe_frame_lists_krw_codes() {
        let (mut gw, _rx) = gateway(4);
        let mut out = Outbox::default();
        gw.on_connect(&mut out);
        assert!(!out.is_empty());
    }

    #[test]
    fn ticker_becomes_a_sequenced_market_update() {
        let (mut gw, mut rx) = gateway(4);
        let payload = br#"{
            "type": "ticker",
            "code": "KRW-BTC",
            "trade_price": 134109000.0,
            "acc_trade_volume_24h": 0.12345678,
            "timestamp": 1704067200000
        }"#;
        gw.on_message(payload);

        let ev = rx.try_recv().unwrap();
        let seqtape_models::Event::MarketUpdate(m) = ev else {
            panic!("expected market update");
        };
        assert_eq!(m.seq, 1);
        assert_eq!(m.symbol, "BTC");
        assert_eq!(m.exchange, "UPBIT");
        assert_eq!(m.ts, 1_704_067_200_000_000);
        assert_eq!(m.price, 134_109_000_000_000);
        assert_eq!(m.qty, 12_345_678);
    }

    #[test]
    fn non_ticker_frames_are_ignored() {
        let (mut gw, mut rx) = gateway(4);
        gw.on_message(br#"{"type":"status","code":"UP"}"#);
        gw.on_message(b"not json");
        assert!(rx.try_recv().is_err());
    }
}
