//! TOML configuration.
//!
//! Secrets belong in the environment (`SEQTAPE_<VENUE>_{KEY,SECRET,...}`)
//! or the per-mode secrets file; values found in the main config file still
//! work but provoke a startup warning. Environment variables always win.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppInfo,
    pub trading: TradingInfo,
    pub api: ApiInfo,
    pub strategy: Option<StrategyInfo>,
    pub engine: EngineInfo,
    pub ui: UiInfo,
    pub logging: LoggingInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "seqtape".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingInfo {
    /// paper | demo | real
    pub mode: String,
    /// Initial virtual deposit for paper/demo sessions, in quote micros.
    pub paper_deposit: i64,
    /// Quote currency backing bare base symbols.
    pub quote_symbol: String,
}

impl Default for TradingInfo {
    fn default() -> Self {
        Self {
            mode: "paper".into(),
            paper_deposit: 100_000_000_000_000, // 100M quote units
            quote_symbol: "KRW".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiInfo {
    pub upbit: UpbitInfo,
    pub bitget: BitgetInfo,
    pub exchange_rate: ExchangeRateInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpbitInfo {
    pub ws_url: String,
    pub rest_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub symbols: Vec<String>,
}

impl Default for UpbitInfo {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.upbit.com/websocket/v1".into(),
            rest_url: "https://api.upbit.com/v1".into(),
            access_key: String::new(),
            secret_key: String::new(),
            symbols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BitgetInfo {
    pub ws_url: String,
    pub rest_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub passphrase: String,
    /// Domain symbol → venue instId, e.g. BTC = "BTCUSDT".
    pub symbols: HashMap<String, String>,
}

impl Default for BitgetInfo {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.bitget.com/v2/ws/public".into(),
            rest_url: "https://api.bitget.com".into(),
            access_key: String::new(),
            secret_key: String::new(),
            passphrase: String::new(),
            symbols: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeRateInfo {
    pub url: String,
    pub poll_interval_sec: u64,
}

impl Default for ExchangeRateInfo {
    fn default() -> Self {
        Self {
            url: "https://query1.finance.yahoo.com/v8/finance/chart/KRW=X".into(),
            poll_interval_sec: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyInfo {
    pub symbol: String,
    pub short_period: usize,
    pub long_period: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineInfo {
    /// Checkpoint every N processed events; 0 disables snapshots.
    pub snapshot_interval: u64,
}

impl Default for EngineInfo {
    fn default() -> Self {
        Self {
            snapshot_interval: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiInfo {
    pub update_interval_ms: u64,
}

impl Default for UiInfo {
    fn default() -> Self {
        Self {
            update_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingInfo {
    pub level: String,
}

impl Default for LoggingInfo {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    /// Read and parse the file, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let mut cfg: Config =
            toml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))?;
        cfg.override_with_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Environment variables beat file values. A secret found in the main
    /// config file is worth a warning: it tends to end up in backups.
    fn override_with_env(&mut self) {
        if !self.api.upbit.secret_key.is_empty() || !self.api.bitget.secret_key.is_empty() {
            warn!(
                "API secrets found in the config file; prefer SEQTAPE_UPBIT_{{KEY,SECRET}} / \
                 SEQTAPE_BITGET_{{KEY,SECRET,PASSPHRASE}} environment variables"
            );
        }

        let overrides: [(&str, &mut String); 5] = [
            ("SEQTAPE_UPBIT_KEY", &mut self.api.upbit.access_key),
            ("SEQTAPE_UPBIT_SECRET", &mut self.api.upbit.secret_key),
            ("SEQTAPE_BITGET_KEY", &mut self.api.bitget.access_key),
            ("SEQTAPE_BITGET_SECRET", &mut self.api.bitget.secret_key),
            ("SEQTAPE_BITGET_PASSPHRASE", &mut self.api.bitget.passphrase),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let upbit_active = !self.api.upbit.symbols.is_empty();
        let bitget_active = !self.api.bitget.symbols.is_empty();
        if !upbit_active && !bitget_active {
            bail!("at least one venue symbol is required");
        }

        if upbit_active && !is_ws_url(&self.api.upbit.ws_url) {
            bail!("invalid Upbit WS URL: {}", self.api.upbit.ws_url);
        }
        if bitget_active && !is_ws_url(&self.api.bitget.ws_url) {
            bail!("invalid Bitget WS URL: {}", self.api.bitget.ws_url);
        }

        if self.ui.update_interval_ms == 0 {
            bail!("ui.update_interval_ms must be positive");
        }

        if let Some(strategy) = &self.strategy {
            if strategy.short_period >= strategy.long_period {
                bail!(
                    "strategy.short_period ({}) must be smaller than long_period ({})",
                    strategy.short_period,
                    strategy.long_period
                );
            }
        }
        Ok(())
    }

    /// Every symbol any venue produces, deduplicated.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .api
            .upbit
            .symbols
            .iter()
            .cloned()
            .chain(self.api.bitget.symbols.keys().cloned())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

fn is_ws_url(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}
