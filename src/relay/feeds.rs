//! Feed registry: the assets the relay can price and their identifiers in
//! each price tier.

use std::fmt;

/// FTSO feed category byte for crypto assets.
const CRYPTO_CATEGORY: u8 = 0x01;

/// Length of an FTSOv2 feed id (`bytes21`).
pub const FEED_ID_LEN: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Btc,
    Eth,
    Flr,
}

impl Symbol {
    pub const ALL: [Symbol; 3] = [Symbol::Btc, Symbol::Eth, Symbol::Flr];

    /// Case-insensitive ticker lookup (`"btc"`, `"ETH"` …).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" => Some(Symbol::Btc),
            "eth" => Some(Symbol::Eth),
            "flr" => Some(Symbol::Flr),
            _ => None,
        }
    }

    /// Upper-case ticker used in spoken summaries.
    pub fn ticker(self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
            Symbol::Flr => "FLR",
        }
    }

    /// Feed name, also the `symbol` field of `/ftso` answers.
    pub fn feed_key(self) -> &'static str {
        match self {
            Symbol::Btc => "BTC/USD",
            Symbol::Eth => "ETH/USD",
            Symbol::Flr => "FLR/USD",
        }
    }

    /// FTSOv2 feed id: category byte, then the ASCII feed name, zero-padded
    /// to 21 bytes.
    pub fn feed_id(self) -> [u8; FEED_ID_LEN] {
        let mut id = [0u8; FEED_ID_LEN];
        id[0] = CRYPTO_CATEGORY;
        let name = self.feed_key().as_bytes();
        id[1..1 + name.len()].copy_from_slice(name);
        id
    }

    /// Coin id on the public fallback API.
    pub fn fallback_id(self) -> &'static str {
        match self {
            Symbol::Btc => "bitcoin",
            Symbol::Eth => "ethereum",
            Symbol::Flr => "flare-token",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}
