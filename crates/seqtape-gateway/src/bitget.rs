//! Bitget spot ticker adapter.
//!
//! Bitget keeps connections alive with an application-level text `"ping"`
//! every 30s and answers `"pong"`; the worker's ping interval drives that
//! exchange. Symbols are configured as a domain-symbol → instId map
//! ("BTC" → "BTCUSDT").

use std::collections::HashMap;
use std::sync::Arc;

use seqtape_quant::fixed_point::{price_from_str, qty_from_str};
use seqtape_quant::SeqCounter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inbox::EventTx;
use crate::worker::{Gateway, Outbox};

pub const EXCHANGE: &str = "BITGET_SPOT";

#[derive(Debug, Serialize)]
struct SubscribeArg {
    #[serde(rename = "instType")]
    inst_type: &'static str,
    channel: &'static str,
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest {
    op: &'static str,
    args: Vec<SubscribeArg>,
}

#[derive(Debug, Default, Deserialize)]
struct TickerArg {
    #[serde(default)]
    channel: String,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "lastPr", default)]
    last_pr: String,
    #[serde(rename = "baseVolume", default)]
    base_volume: String,
}

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(default)]
    arg: TickerArg,
    #[serde(default)]
    data: Vec<TickerData>,
    /// Milliseconds.
    #[serde(default)]
    ts: i64,
}

pub struct BitgetSpotGateway {
    ws_url: String,
    /// Domain symbol → venue instId.
    symbols: HashMap<String, String>,
    tx: EventTx,
    seq: Arc<SeqCounter>,
}

impl BitgetSpotGateway {
    pub fn new(
        ws_url: String,
        symbols: HashMap<String, String>,
        tx: EventTx,
        seq: Arc<SeqCounter>,
    ) -> Self {
        Self {
            ws_url,
            symbols,
            tx,
            seq,
        }
    }

    fn domain_symbol(&self, inst_id: &str) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, id)| id.as_str() == inst_id)
            .map(|(sym, _)| sym.as_str())
    }
}

impl Gateway for BitgetSpotGateway {
    fn id(&self) -> &str {
        EXCHANGE
    }

    fn endpoint(&self) -> String {
        self.ws_url.clone()
    }

    fn on_connect(&mut self, out: &mut Outbox) {
        let args = self
            .symbols
            .values()
            .map(|id| SubscribeArg {
                inst_type: "SPOT",
                channel: "ticker",
                inst_id: id.clone(),
            })
            .collect();
        let request = SubscribeRequest {
            op: "subscribe",
            args,
        };
        out.text(serde_json::to_string(&request).expect("static subscribe request"));
    }

    fn on_message(&mut self, payload: &[u8]) {
        if payload == b"pong" {
            return;
        }
        let msg: TickerMessage = match serde_json::from_slice(payload) {
            Ok(msg) => msg,
            Err(_) => return, // subscription acks, error frames
        };
        if msg.arg.channel != "ticker" || msg.data.is_empty() {
            return;
        }

        let ts = msg.ts * 1_000;
        for data in &msg.data {
            let Some(symbol) = self.domain_symbol(&data.inst_id) else {
                continue;
            };
            let (Ok(price), Ok(qty)) = (
                price_from_str(&data.last_pr),
                qty_from_str(&data.base_volume),
            ) else {
                debug!(inst_id = %data.inst_id, "malformed ticker numerics, dropped");
                continue;
            };

            let mut ev = self.tx.pool().acquire();
            ev.seq = self.seq.next();
            ev.ts = ts;
            ev.symbol.push_str(symbol);
            ev.price = price;
            ev.qty = qty;
            ev.exchange.push_str(EXCHANGE);
            self.tx.push_market(ev);
        }
    }

    fn on_ping(&mut self, out: &mut Outbox) {
        out.text("ping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqtape_models::EventPool;
    use tokio::sync::mpsc;

    fn gateway() -> (BitgetSpotGateway, mpsc::Receiver<seqtape_models::Event>) {
        let (tx, rx) = mpsc::channel(8);
        let pool = Arc::new(EventPool::new());
        let mut symbols = HashMap::new();
        symbols.insert("BTC".to_string(), "BTCUSDT".to_string());
        let gw = BitgetSpotGateway::new(
            "wss://ws.bitget.com/v2/ws/public".into(),
            symbols,
            EventTx::new(tx, pool),
            Arc::new(SeqCounter::new()),
        );
        (gw, rx)
    }

    #[test]
    fn ticker_data_maps_back_to_domain_symbol() {
        let (mut gw, mut rx) = gateway();
        let payload = br#"{
            "arg": {"channel": "ticker"},
            "data": [{"instId": "BTCUSDT", "lastPr": "90000.12", "baseVolume": "1.5"}],
            "ts": 1704067200000
        }"#;
        gw.on_message(payload);

        let seqtape_models::Event::MarketUpdate(m) = rx.try_recv().unwrap() else {
            panic!("expected market update");
        };
        assert_eq!(m.symbol, "BTC");
        assert_eq!(m.exchange, "BITGET_SPOT");
        assert_eq!(m.price, 90_000_120_000);
        assert_eq!(m.qty, 150_000_000);
        assert_eq!(m.ts, 1_704_067_200_000_000);
    }

    #[test]
    fn unknown_inst_ids_and_pong_are_ignored() {
        let (mut gw, mut rx) = gateway();
        gw.on_message(b"pong");
        let payload = br#"{
            "arg": {"channel": "ticker"},
            "data": [{"instId": "ETHUSDT", "lastPr": "3000", "baseVolume": "1"}],
            "ts": 1
        }"#;
        gw.on_message(payload);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn keep_alive_is_an_application_ping() {
        let (mut gw, _rx) = gateway();
        let mut out = Outbox::default();
        gw.on_ping(&mut out);
        assert!(!out.is_empty());
    }
}
