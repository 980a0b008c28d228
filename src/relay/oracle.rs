//! Primary price tier: FtsoV2 `getFeedsById` read over JSON-RPC `eth_call`.
//!
//! Only this one view call is needed, so its ABI encoding is written out by
//! hand:
//!
//! ```text
//! calldata = selector(4) ‖ offset=0x20 ‖ len=1 ‖ feed_id (bytes21, left-aligned)
//! return   = (uint256[] values, int8[] decimals, uint64 timestamp)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::feeds::{Symbol, FEED_ID_LEN};
use super::source::{PriceSource, SourceError, SourceReading};
use crate::config::OracleConfig;

/// `bytes4(keccak256("getFeedsById(bytes21[])"))`.
pub const GET_FEEDS_BY_ID_SELECTOR: [u8; 4] = [0x4c, 0x37, 0x57, 0x45];

const WORD: usize = 32;

// ---------------------------------------------------------------------------
// ABI helpers
// ---------------------------------------------------------------------------

/// Calldata for `getFeedsById([feed_id])`.
pub fn encode_get_feeds_by_id(feed_id: &[u8; FEED_ID_LEN]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 3 * WORD);
    data.extend_from_slice(&GET_FEEDS_BY_ID_SELECTOR);
    data.extend_from_slice(&uint_word(WORD as u64));
    data.extend_from_slice(&uint_word(1));
    let mut element = [0u8; WORD];
    element[..FEED_ID_LEN].copy_from_slice(feed_id);
    data.extend_from_slice(&element);
    data
}

fn uint_word(n: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&n.to_be_bytes());
    word
}

/// First feed of a decoded `getFeedsById` return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedValue {
    pub raw: u128,
    pub decimals: i8,
    pub timestamp: u64,
}

impl FeedValue {
    /// `raw / 10^decimals`.
    pub fn value(&self) -> f64 {
        self.raw as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

/// Decode the first entry of `(uint256[], int8[], uint64)`.
pub fn decode_feeds_by_id(data: &[u8]) -> Result<FeedValue, SourceError> {
    let values_at = word_as_usize(data, 0)?;
    let decimals_at = word_as_usize(data, WORD)?;
    let timestamp = word_as_u64(data, 2 * WORD)?;

    if word_as_usize(data, values_at)? == 0 || word_as_usize(data, decimals_at)? == 0 {
        return Err(SourceError::Decode("empty feed arrays".into()));
    }

    let raw_word = word(data, values_at + WORD)?;
    if raw_word[..16].iter().any(|&b| b != 0) {
        return Err(SourceError::Decode("feed value exceeds 128 bits".into()));
    }
    let mut raw_bytes = [0u8; 16];
    raw_bytes.copy_from_slice(&raw_word[16..]);

    let decimals_word = word(data, decimals_at + WORD)?;
    let decimals = decimals_word[WORD - 1] as i8;
    let pad = if decimals < 0 { 0xff } else { 0x00 };
    if decimals_word[..WORD - 1].iter().any(|&b| b != pad) {
        return Err(SourceError::Decode("decimals is not a sign-extended int8".into()));
    }

    Ok(FeedValue {
        raw: u128::from_be_bytes(raw_bytes),
        decimals,
        timestamp,
    })
}

fn word(data: &[u8], at: usize) -> Result<&[u8], SourceError> {
    data.get(at..at + WORD)
        .ok_or_else(|| SourceError::Decode(format!("return data too short at offset {at}")))
}

fn word_as_u64(data: &[u8], at: usize) -> Result<u64, SourceError> {
    let w = word(data, at)?;
    if w[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(SourceError::Decode(format!("word at offset {at} exceeds 64 bits")));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&w[WORD - 8..]);
    Ok(u64::from_be_bytes(bytes))
}

fn word_as_usize(data: &[u8], at: usize) -> Result<usize, SourceError> {
    usize::try_from(word_as_u64(data, at)?)
        .map_err(|_| SourceError::Decode(format!("word at offset {at} overflows usize")))
}

// ---------------------------------------------------------------------------
// FtsoOracle
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct FtsoOracle {
    client: reqwest::Client,
    rpc_url: String,
    contract: String,
}

impl FtsoOracle {
    pub fn from_config(config: &OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            rpc_url: config.rpc_url.clone(),
            contract: config.contract_address.clone(),
        }
    }

    async fn eth_call(&self, calldata: &[u8]) -> Result<Vec<u8>, SourceError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.contract, "data": format!("0x{}", hex::encode(calldata)) },
                "latest"
            ]
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(SourceError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| SourceError::Decode("JSON-RPC response has no result".into()))?;

        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| SourceError::Decode(format!("result is not hex: {e}")))
    }
}

#[async_trait]
impl PriceSource for FtsoOracle {
    fn name(&self) -> &'static str {
        "ftso"
    }

    async fn read(&self, symbol: Symbol) -> Result<SourceReading, SourceError> {
        let calldata = encode_get_feeds_by_id(&symbol.feed_id());
        let data = self.eth_call(&calldata).await?;
        let feed = decode_feeds_by_id(&data)?;
        log::debug!(
            "relay: ftso {} raw={} decimals={} ts={}",
            symbol.feed_key(),
            feed.raw,
            feed.decimals,
            feed.timestamp
        );
        Ok(SourceReading {
            value: feed.value(),
            timestamp: Some(feed.timestamp),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
