//! Quote-currency FX rate poller.
//!
//! Not every venue quotes in the same currency, so the core tracks the
//! USD/KRW rate as one more market: a REST poller fetches the Yahoo chart
//! endpoint on an interval and emits an ordinary sequenced `MarketUpdate`
//! for the synthetic symbol `USDKRW`. A failed poll is logged and retried
//! on the next tick; the stream is advisory, never fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use seqtape_quant::fixed_point::price_from_str;
use seqtape_quant::SeqCounter;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::inbox::EventTx;

pub const FX_SYMBOL: &str = "USDKRW";
pub const EXCHANGE: &str = "FX";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<serde_json::Number>,
}

pub struct FxRatePoller {
    url: String,
    poll_interval: Duration,
    tx: EventTx,
    seq: Arc<SeqCounter>,
}

impl FxRatePoller {
    pub fn new(url: String, poll_interval: Duration, tx: EventTx, seq: Arc<SeqCounter>) -> Self {
        Self {
            url,
            poll_interval,
            tx,
            seq,
        }
    }

    /// Start polling. Fetches once immediately, then on the interval, until
    /// the cancel signal fires.
    pub fn spawn(self, cancel: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, mut cancel: watch::Receiver<bool>) {
        let client = match reqwest::Client::builder().timeout(HTTP_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "fx poller could not build http client");
                return;
            }
        };

        if let Err(e) = self.fetch_once(&client).await {
            warn!(error = %e, "initial fx fetch failed");
        }

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    info!("fx poller stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.fetch_once(&client).await {
                        warn!(error = %e, "fx fetch failed");
                    }
                }
            }
        }
    }

    async fn fetch_once(&self, client: &reqwest::Client) -> Result<(), reqwest::Error> {
        let mut last_err = None;
        for attempt in 0..FETCH_ATTEMPTS {
            if attempt > 0 {
                sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }
            match self.fetch(client).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.expect("at least one attempt ran"))
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<(), reqwest::Error> {
        let resp: ChartResponse = client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let price = resp
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .and_then(|d| d.meta.regular_market_price.as_ref())
            .and_then(|n| price_from_str(&n.to_string()).ok());
        let Some(price) = price else {
            warn!("fx response missing regularMarketPrice");
            return Ok(());
        };

        let mut ev = self.tx.pool().acquire();
        ev.seq = self.seq.next();
        ev.ts = Utc::now().timestamp_micros();
        ev.symbol.push_str(FX_SYMBOL);
        ev.price = price;
        ev.exchange.push_str(EXCHANGE);
        self.tx.push_market(ev);
        Ok(())
    }
}
