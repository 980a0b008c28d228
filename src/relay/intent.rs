//! Free-text intent classification for `/search`.

use super::feeds::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Answer from the price tiers.
    Price(Symbol),
    /// Forward to the search service.
    Search,
}

/// Keywords per asset, checked in priority order BTC > ETH > FLR.
const ASSET_KEYWORDS: [(Symbol, &[&str]); 3] = [
    (Symbol::Btc, &["btc", "bitcoin"]),
    (Symbol::Eth, &["eth", "ethereum"]),
    (Symbol::Flr, &["flr", "flare"]),
];

/// A query is a price question when it mentions "price" or "rate" and at
/// least one asset.  Matching is plain substring matching on the lower-cased
/// text, so "generate" counts as "rate" and "ethics" as "eth".
///
/// ```
/// use hud_agent::relay::{classify, Intent, Symbol};
///
/// assert_eq!(classify("what is the price of btc"), Intent::Price(Symbol::Btc));
/// assert_eq!(classify("eth and flare rate"), Intent::Price(Symbol::Eth));
/// assert_eq!(classify("who founded bitcoin"), Intent::Search);
/// ```
pub fn classify(query: &str) -> Intent {
    let q = query.to_lowercase();
    if !(q.contains("price") || q.contains("rate")) {
        return Intent::Search;
    }
    ASSET_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| q.contains(w)))
        .map(|(symbol, _)| Intent::Price(*symbol))
        .unwrap_or(Intent::Search)
}
