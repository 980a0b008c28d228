//! Fallback price tier: CoinGecko-compatible `simple/price` API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::feeds::Symbol;
use super::source::{PriceSource, SourceError, SourceReading};
use crate::config::OracleConfig;

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGecko {
    pub fn from_config(config: &OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.fallback_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn price_url(&self, symbol: Symbol) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            symbol.fallback_id()
        )
    }
}

/// Pull `body[<id>].usd` out of a `simple/price` answer.
fn extract_usd(body: &HashMap<String, UsdQuote>, symbol: Symbol) -> Result<f64, SourceError> {
    body.get(symbol.fallback_id())
        .and_then(|quote| quote.usd)
        .ok_or(SourceError::Missing(symbol))
}

#[async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn read(&self, symbol: Symbol) -> Result<SourceReading, SourceError> {
        let body: HashMap<String, UsdQuote> = self
            .client
            .get(self.price_url(symbol))
            .send()
            .await?
            .json()
            .await?;

        Ok(SourceReading {
            value: extract_usd(&body, symbol)?,
            timestamp: None,
        })
    }
}
