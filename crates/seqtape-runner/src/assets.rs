//! Symbol metadata in the KV side-table.
//!
//! One `coin:<symbol>` record per configured symbol, refreshed at startup.
//! User-owned fields (favorite flag) survive the sync; timestamps are Unix
//! micros.

use anyhow::{Context, Result};
use chrono::Utc;
use seqtape_store::EventStore;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinInfo {
    pub symbol: String,
    pub name: String,
    pub is_active: bool,
    pub is_favorite: bool,
    pub last_synced_unix: i64,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
}

fn coin_key(symbol: &str) -> String {
    format!("coin:{symbol}")
}

/// Refresh metadata for every configured symbol.
pub fn sync_symbols(store: &EventStore, symbols: &[String]) -> Result<()> {
    let now = Utc::now().timestamp_micros();
    for symbol in symbols {
        let key = coin_key(symbol);
        let mut coin = CoinInfo {
            symbol: symbol.clone(),
            name: symbol.clone(),
            is_active: true,
            created_at_unix: now,
            ..Default::default()
        };

        if let Some(raw) = store.get_metadata(&key)? {
            if let Ok(existing) = serde_json::from_str::<CoinInfo>(&raw) {
                coin.is_favorite = existing.is_favorite;
                coin.created_at_unix = existing.created_at_unix;
            }
        }

        coin.last_synced_unix = now;
        coin.updated_at_unix = now;

        let value = serde_json::to_string(&coin).context("encode coin info")?;
        store.upsert_metadata(&key, &value, now)?;
    }
    info!(count = symbols.len(), "symbol metadata synced");
    Ok(())
}

/// Toggle the user's favorite flag for a symbol.
pub fn set_favorite(store: &EventStore, symbol: &str, favorite: bool) -> Result<()> {
    let key = coin_key(symbol);
    let now = Utc::now().timestamp_micros();
    let mut coin = match store.get_metadata(&key)? {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        None => CoinInfo {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            is_active: true,
            created_at_unix: now,
            ..Default::default()
        },
    };
    coin.is_favorite = favorite;
    coin.updated_at_unix = now;

    let value = serde_json::to_string(&coin).context("encode coin info")?;
    store.upsert_metadata(&key, &value, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_preserves_the_favorite_flag() {
        let store = EventStore::open_in_memory().unwrap();
        let symbols = vec!["BTC".to_string(), "ETH".to_string()];

        sync_symbols(&store, &symbols).unwrap();
        set_favorite(&store, "BTC", true).unwrap();
        sync_symbols(&store, &symbols).unwrap();

        let raw = store.get_metadata("coin:BTC").unwrap().unwrap();
        let coin: CoinInfo = serde_json::from_str(&raw).unwrap();
        assert!(coin.is_favorite);
        assert_eq!(coin.symbol, "BTC");

        let raw = store.get_metadata("coin:ETH").unwrap().unwrap();
        let coin: CoinInfo = serde_json::from_str(&raw).unwrap();
        assert!(!coin.is_favorite);
    }
}
