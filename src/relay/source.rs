//! Price tiers: the `PriceSource` trait and what a resolution produces.

use async_trait::async_trait;
use thiserror::Error;

use super::feeds::Symbol;

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Failure of a single price tier.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("no price for {0}")]
    Missing(Symbol),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PriceSource
// ---------------------------------------------------------------------------

/// One reading from a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceReading {
    pub value: f64,
    /// Unix seconds of the feed update, when the tier reports one.
    pub timestamp: Option<u64>,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn read(&self, symbol: Symbol) -> Result<SourceReading, SourceError>;
}

// ---------------------------------------------------------------------------
// PriceQuote
// ---------------------------------------------------------------------------

/// Which tier produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Primary,
    Fallback,
}

impl SourceTag {
    /// `source` field of `/ftso` answers.
    pub fn wire_name(self) -> &'static str {
        match self {
            SourceTag::Primary => "ftso",
            SourceTag::Fallback => "coingecko_fallback",
        }
    }

    /// `source` field of `/search` price answers.
    pub fn search_label(self) -> &'static str {
        match self {
            SourceTag::Primary => "ftso",
            SourceTag::Fallback => "coingecko",
        }
    }
}

/// Result of resolving a symbol.  `value` is `None` only when both tiers
/// failed; `timestamp` is only ever set by the primary tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub symbol: Symbol,
    pub value: Option<f64>,
    pub source: SourceTag,
    pub timestamp: Option<u64>,
}

impl PriceQuote {
    /// Spoken summary, e.g. `BTC price: 64000.12 USD`, with ` (fallback)`
    /// appended when the fallback tier answered and `null` standing in for a
    /// missing value.
    pub fn summary(&self) -> String {
        let value = match self.value {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        };
        let suffix = match self.source {
            SourceTag::Primary => "",
            SourceTag::Fallback => " (fallback)",
        };
        format!("{} price: {value} USD{suffix}", self.symbol.ticker())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_summary() {
        let quote = PriceQuote {
            symbol: Symbol::Btc,
            value: Some(64000.12),
            source: SourceTag::Primary,
            timestamp: Some(1_700_000_000),
        };
        assert_eq!(quote.summary(), "BTC price: 64000.12 USD");
    }

    #[test]
    fn fallback_summary_and_null_value() {
        let quote = PriceQuote {
            symbol: Symbol::Eth,
            value: Some(3200.0),
            source: SourceTag::Fallback,
            timestamp: None,
        };
        assert_eq!(quote.summary(), "ETH price: 3200 USD (fallback)");

        let failed = PriceQuote { value: None, ..quote };
        assert_eq!(failed.summary(), "ETH price: null USD (fallback)");
    }

    #[test]
    fn tag_names() {
        assert_eq!(SourceTag::Primary.wire_name(), "ftso");
        assert_eq!(SourceTag::Fallback.wire_name(), "coingecko_fallback");
        assert_eq!(SourceTag::Fallback.search_label(), "coingecko");
    }
}
