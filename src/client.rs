//! Outbound calls made by the session: relay search, relay gesture
//! classification, and the captioning upload.
//!
//! Replies are decoded whatever the HTTP status, because the relay answers
//! its own faults with a JSON body the session still has to read
//! (`{"error": "gesture_error", ...}` simply carries no `text`).  Only a
//! body that is not the expected JSON is an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::frame::CaptureFrame;

// ---------------------------------------------------------------------------
// ClientError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success status with a body that is not the expected JSON.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Success status but the body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchReply {
    pub summary: Option<String>,
    /// Present on price answers: `"ftso"` or `"coingecko"`.
    pub source: Option<String>,
}

impl SearchReply {
    /// The summary when it is present and non-blank.
    pub fn summary_text(&self) -> Option<&str> {
        non_blank(self.summary.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureReply {
    pub text: Option<String>,
}

impl GestureReply {
    pub fn label(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptionReply {
    pub caption: Option<String>,
    /// Service-specific error payload; only logged.
    pub error: Option<serde_json::Value>,
}

impl CaptionReply {
    pub fn caption_text(&self) -> Option<&str> {
        non_blank(self.caption.as_deref())
    }

    /// `true` when the service reported an error (any non-null, non-false,
    /// non-empty value).
    pub fn has_error(&self) -> bool {
        match &self.error {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// HudBackend trait
// ---------------------------------------------------------------------------

/// Everything the session sends over the network.
#[async_trait]
pub trait HudBackend: Send + Sync {
    /// `POST {relay}/search {query}`.
    async fn search(&self, query: &str) -> Result<SearchReply, ClientError>;

    /// `POST {relay}/gesture {frame: dataURI}`.
    async fn classify_gesture(&self, frame: &CaptureFrame) -> Result<GestureReply, ClientError>;

    /// Multipart upload of the frame as `image` / `scene.jpg`.
    async fn caption(&self, frame: &CaptureFrame) -> Result<CaptionReply, ClientError>;
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

pub struct HttpBackend {
    client: reqwest::Client,
    relay_url: String,
    caption_url: String,
}

impl HttpBackend {
    pub fn from_config(config: &SessionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            relay_url: config.relay_url.trim_end_matches('/').to_string(),
            caption_url: config.caption_url.clone(),
        }
    }

    fn relay(&self, path: &str) -> String {
        format!("{}{path}", self.relay_url)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    decode_body(status.as_u16(), status.is_success(), &bytes)
}

fn decode_body<T: DeserializeOwned>(
    status: u16,
    success: bool,
    bytes: &[u8],
) -> Result<T, ClientError> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if !success => Err(ClientError::Upstream {
            status,
            body: String::from_utf8_lossy(bytes).into_owned(),
        }),
        Err(e) => Err(ClientError::Decode(e.to_string())),
    }
}

#[async_trait]
impl HudBackend for HttpBackend {
    async fn search(&self, query: &str) -> Result<SearchReply, ClientError> {
        let response = self
            .client
            .post(self.relay("/search"))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        read_json(response).await
    }

    async fn classify_gesture(&self, frame: &CaptureFrame) -> Result<GestureReply, ClientError> {
        let response = self
            .client
            .post(self.relay("/gesture"))
            .json(&serde_json::json!({ "frame": frame.to_data_uri() }))
            .send()
            .await?;
        read_json(response).await
    }

    async fn caption(&self, frame: &CaptureFrame) -> Result<CaptionReply, ClientError> {
        let image = reqwest::multipart::Part::bytes(frame.jpeg.clone())
            .file_name("scene.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("image", image);

        let response = self
            .client
            .post(&self.caption_url)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_errors_decode_as_empty_replies() {
        let reply: GestureReply =
            decode_body(500, false, br#"{"error":"gesture_error","message":"down"}"#).unwrap();
        assert_eq!(reply.label(), None);

        let reply: SearchReply =
            decode_body(500, false, br#"{"error":"search_error","message":"x"}"#).unwrap();
        assert_eq!(reply.summary_text(), None);
    }

    #[test]
    fn non_json_error_page_is_upstream() {
        let err = decode_body::<SearchReply>(502, false, b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::Upstream { status: 502, .. }));
    }

    #[test]
    fn garbage_success_body_is_decode_error() {
        let err = decode_body::<SearchReply>(200, true, b"not json").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn price_reply_carries_source() {
        let reply: SearchReply = decode_body(
            200,
            true,
            br#"{"summary":"BTC price: 64000.12 USD","source":"ftso"}"#,
        )
        .unwrap();
        assert_eq!(reply.summary_text(), Some("BTC price: 64000.12 USD"));
        assert_eq!(reply.source.as_deref(), Some("ftso"));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let reply: SearchReply = decode_body(200, true, br#"{"summary":"  "}"#).unwrap();
        assert_eq!(reply.summary_text(), None);

        let reply: GestureReply = decode_body(200, true, br#"{"text":""}"#).unwrap();
        assert_eq!(reply.label(), None);
    }

    #[test]
    fn caption_error_detection() {
        let reply: CaptionReply = decode_body(200, true, br#"{"error":"model loading"}"#).unwrap();
        assert!(reply.has_error());
        assert_eq!(reply.caption_text(), None);

        let reply: CaptionReply = decode_body(200, true, br#"{"caption":"a desk","error":null}"#).unwrap();
        assert!(!reply.has_error());
        assert_eq!(reply.caption_text(), Some("a desk"));

        let reply: CaptionReply = decode_body(200, true, br#"{"error":{"code":503}}"#).unwrap();
        assert!(reply.has_error());
    }

    #[test]
    fn relay_paths_tolerate_trailing_slash() {
        let mut config = SessionConfig::default();
        config.relay_url = "http://localhost:3001/".into();
        let backend = HttpBackend::from_config(&config);
        assert_eq!(backend.relay("/search"), "http://localhost:3001/search");
    }
}
