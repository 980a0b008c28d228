//! Relay resolver: what the relay server does with each request.
//!
//! # Architecture
//!
//! ```text
//!  /search {query} ──▶ classify ─┬─ Price(sym) ─▶ SourceFallbackResolver ─┬─▶ FtsoOracle
//!                                │                                        └─▶ CoinGecko
//!                                └─ Search ─────▶ Upstream (search service)
//!  /gesture {frame} ────────────────────────────▶ Upstream (gesture classifier)
//!  /ftso {symbol} ──▶ Symbol::parse ────────────▶ SourceFallbackResolver
//! ```
//!
//! One [`SourceFallbackResolver`] instance serves both `/ftso` and the price
//! branch of `/search`.  Forwarded calls relay the service's JSON unmodified.

pub mod coingecko;
pub mod fallback;
pub mod feeds;
pub mod intent;
pub mod oracle;
pub mod source;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{OracleConfig, RelayConfig};

pub use coingecko::CoinGecko;
pub use fallback::SourceFallbackResolver;
pub use feeds::Symbol;
pub use intent::{classify, Intent};
pub use oracle::FtsoOracle;
pub use source::{PriceQuote, PriceSource, SourceError, SourceReading, SourceTag};

// ---------------------------------------------------------------------------
// RelayError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RelayError {
    /// `/ftso` symbol outside the feed registry.
    #[error("unsupported symbol: {0:?}")]
    UnsupportedSymbol(String),

    /// `/gesture` body without a frame.
    #[error("missing frame")]
    MissingFrame,

    /// A forwarded call failed or answered with something other than JSON.
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// The request could not be processed at all (e.g. unreadable body).
    #[error("{0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// External services the relay forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Search,
    Gesture,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// POST `body` to `service` and return its JSON answer, whatever the
    /// status code.
    async fn forward(&self, service: Service, body: Value) -> Result<Value, RelayError>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
    search_url: String,
    gesture_url: String,
}

impl HttpUpstream {
    pub fn from_config(config: &RelayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            search_url: config.search_url.clone(),
            gesture_url: config.gesture_url.clone(),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, service: Service, body: Value) -> Result<Value, RelayError> {
        let url = match service {
            Service::Search => &self.search_url,
            Service::Gesture => &self.gesture_url,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// `/search` answer for price questions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub summary: String,
    pub source: &'static str,
}

impl From<PriceQuote> for PriceSummary {
    fn from(quote: PriceQuote) -> Self {
        Self {
            summary: quote.summary(),
            source: quote.source.search_label(),
        }
    }
}

/// `/ftso` answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedAnswer {
    pub symbol: &'static str,
    pub price: Option<f64>,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl From<PriceQuote> for FeedAnswer {
    fn from(quote: PriceQuote) -> Self {
        Self {
            symbol: quote.symbol.feed_key(),
            price: quote.value,
            source: quote.source.wire_name(),
            timestamp: quote.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayResolver
// ---------------------------------------------------------------------------

pub struct RelayResolver {
    prices: SourceFallbackResolver,
    upstream: Arc<dyn Upstream>,
}

impl RelayResolver {
    pub fn new(prices: SourceFallbackResolver, upstream: Arc<dyn Upstream>) -> Self {
        Self { prices, upstream }
    }

    /// Production wiring: FTSO oracle, CoinGecko fallback, HTTP upstreams.
    pub fn from_config(relay: &RelayConfig, oracle: &OracleConfig) -> Self {
        let prices = SourceFallbackResolver::new(
            Arc::new(FtsoOracle::from_config(oracle)),
            Arc::new(CoinGecko::from_config(oracle)),
        );
        Self::new(prices, Arc::new(HttpUpstream::from_config(relay)))
    }

    /// `/search`: price questions are answered locally, anything else is
    /// forwarded verbatim.
    pub async fn search(&self, query: Option<&str>) -> Result<Value, RelayError> {
        let text = query.unwrap_or_default();
        match classify(text) {
            Intent::Price(symbol) => {
                log::info!("relay: price intent {symbol} for {text:?}");
                let answer = PriceSummary::from(self.prices.resolve(symbol).await);
                serde_json::to_value(answer).map_err(|e| RelayError::Internal(e.to_string()))
            }
            Intent::Search => {
                let body = match query {
                    Some(q) => serde_json::json!({ "query": q }),
                    None => serde_json::json!({}),
                };
                self.upstream.forward(Service::Search, body).await
            }
        }
    }

    /// `/ftso`: resolve a ticker.  Never fails once the symbol is known.
    pub async fn price(&self, symbol: &str) -> Result<FeedAnswer, RelayError> {
        let symbol =
            Symbol::parse(symbol).ok_or_else(|| RelayError::UnsupportedSymbol(symbol.to_string()))?;
        Ok(self.prices.resolve(symbol).await.into())
    }

    /// `/gesture`: forward the frame to the classifier.
    pub async fn gesture(&self, frame: Option<&str>) -> Result<Value, RelayError> {
        let frame = frame
            .filter(|f| !f.is_empty())
            .ok_or(RelayError::MissingFrame)?;
        self.upstream
            .forward(Service::Gesture, serde_json::json!({ "frame": frame }))
            .await
    }
}

// ---------------------------------------------------------------------------
// Test doubles (shared with the server tests)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::fakes::RecordingUpstream;
    use super::fallback::fakes::StubSource;
    use super::*;

    fn resolver(primary: StubSource, fallback: StubSource, upstream: RecordingUpstream) -> (RelayResolver, Arc<RecordingUpstream>) {
        let upstream = Arc::new(upstream);
        let prices = SourceFallbackResolver::new(Arc::new(primary), Arc::new(fallback));
        let resolver = RelayResolver::new(prices, Arc::clone(&upstream) as Arc<dyn Upstream>);
        (resolver, upstream)
    }

    #[tokio::test]
    async fn price_question_answered_from_oracle() {
        let (relay, upstream) = resolver(
            StubSource::ok(64000.12, Some(1_700_000_000)),
            StubSource::failing(),
            RecordingUpstream::default(),
        );

        let answer = relay.search(Some("what is the price of btc")).await.unwrap();

        assert_eq!(answer, json!({ "summary": "BTC price: 64000.12 USD", "source": "ftso" }));
        assert!(upstream.forwarded().is_empty());
    }

    #[tokio::test]
    async fn price_question_falls_back() {
        let (relay, _) = resolver(
            StubSource::failing(),
            StubSource::ok(0.021, None),
            RecordingUpstream::default(),
        );

        let answer = relay.search(Some("Flare rate please")).await.unwrap();
        assert_eq!(
            answer,
            json!({ "summary": "FLR price: 0.021 USD (fallback)", "source": "coingecko" })
        );
    }

    #[tokio::test]
    async fn price_question_with_both_tiers_down() {
        let (relay, _) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::default(),
        );

        let answer = relay.search(Some("eth price")).await.unwrap();
        assert_eq!(answer["summary"], "ETH price: null USD (fallback)");
    }

    #[tokio::test]
    async fn other_queries_are_forwarded_verbatim() {
        let (relay, upstream) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::replying(json!({ "summary": "Paris", "extra": [1, 2] })),
        );

        let answer = relay.search(Some("Capital of France")).await.unwrap();

        assert_eq!(answer, json!({ "summary": "Paris", "extra": [1, 2] }));
        assert_eq!(
            upstream.forwarded(),
            vec![(Service::Search, json!({ "query": "Capital of France" }))]
        );
    }

    #[tokio::test]
    async fn forward_failure_is_upstream_error() {
        let (relay, _) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::default(),
        );
        assert!(matches!(
            relay.search(Some("news")).await,
            Err(RelayError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn ftso_answer_shapes() {
        let (relay, _) = resolver(
            StubSource::ok(3200.5, Some(42)),
            StubSource::failing(),
            RecordingUpstream::default(),
        );
        let answer = relay.price("ETH").await.unwrap();
        assert_eq!(
            serde_json::to_value(answer).unwrap(),
            json!({ "symbol": "ETH/USD", "price": 3200.5, "source": "ftso", "timestamp": 42 })
        );

        let (relay, _) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::default(),
        );
        let answer = relay.price("btc").await.unwrap();
        assert_eq!(
            serde_json::to_value(answer).unwrap(),
            json!({ "symbol": "BTC/USD", "price": null, "source": "coingecko_fallback" })
        );
    }

    #[tokio::test]
    async fn unsupported_symbol() {
        let (relay, _) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::default(),
        );
        assert!(matches!(
            relay.price("doge").await,
            Err(RelayError::UnsupportedSymbol(_))
        ));
    }

    #[tokio::test]
    async fn gesture_requires_frame() {
        let (relay, upstream) = resolver(
            StubSource::failing(),
            StubSource::failing(),
            RecordingUpstream::replying(json!({ "text": "fist" })),
        );

        assert!(matches!(relay.gesture(None).await, Err(RelayError::MissingFrame)));
        assert!(matches!(relay.gesture(Some("")).await, Err(RelayError::MissingFrame)));

        let answer = relay.gesture(Some("data:image/jpeg;base64,AA==")).await.unwrap();
        assert_eq!(answer, json!({ "text": "fist" }));
        assert_eq!(
            upstream.forwarded(),
            vec![(Service::Gesture, json!({ "frame": "data:image/jpeg;base64,AA==" }))]
        );
    }
}
