//! Source-fallback resolver: primary tier, then the fallback tier once.
//!
//! [`SourceFallbackResolver::resolve`] never fails.  When both tiers fail
//! the quote carries no value and the fallback tag, and the caller renders
//! that as `null`.

use std::sync::Arc;

use super::feeds::Symbol;
use super::source::{PriceQuote, PriceSource, SourceTag};

pub struct SourceFallbackResolver {
    primary: Arc<dyn PriceSource>,
    fallback: Arc<dyn PriceSource>,
}

impl SourceFallbackResolver {
    pub fn new(primary: Arc<dyn PriceSource>, fallback: Arc<dyn PriceSource>) -> Self {
        Self { primary, fallback }
    }

    pub async fn resolve(&self, symbol: Symbol) -> PriceQuote {
        match self.primary.read(symbol).await {
            Ok(reading) => {
                return PriceQuote {
                    symbol,
                    value: Some(reading.value),
                    source: SourceTag::Primary,
                    timestamp: reading.timestamp,
                };
            }
            Err(e) => {
                log::warn!(
                    "relay: {} read for {} failed ({e}), trying {}",
                    self.primary.name(),
                    symbol.feed_key(),
                    self.fallback.name()
                );
            }
        }

        let value = match self.fallback.read(symbol).await {
            Ok(reading) => Some(reading.value),
            Err(e) => {
                log::warn!(
                    "relay: {} read for {} failed too: {e}",
                    self.fallback.name(),
                    symbol.feed_key()
                );
                None
            }
        };

        PriceQuote {
            symbol,
            value,
            source: SourceTag::Fallback,
            timestamp: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles (shared with the relay and server tests)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
