//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a `settings.toml` only needs the
//! keys it wants to override.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Settings for the relay server and the services it forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interface the relay binds to.
    pub bind: String,
    /// TCP port the relay listens on.
    pub port: u16,
    /// Search/summary service that receives non-price queries verbatim.
    pub search_url: String,
    /// Gesture classifier that receives `{frame}` bodies verbatim.
    pub gesture_url: String,
    /// Per-request timeout for forwarded calls.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3001,
            search_url: "http://127.0.0.1:5001/api/search".into(),
            gesture_url: "http://127.0.0.1:5001/api/gesture".into(),
            timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    /// `bind:port` string accepted by `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ---------------------------------------------------------------------------
// OracleConfig
// ---------------------------------------------------------------------------

/// Settings for the two price tiers: the on-chain oracle and the public
/// fallback API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// JSON-RPC endpoint of the chain hosting the oracle contract.
    pub rpc_url: String,
    /// Address of the FtsoV2 contract.
    pub contract_address: String,
    /// Base URL of the CoinGecko-compatible fallback API.
    pub fallback_base_url: String,
    /// Per-request timeout for both tiers.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://flare-api.flare.network/ext/C/rpc".into(),
            contract_address: "0x3d893C53D9e8056135C26C8c638B76C8b60Df726".into(),
            fallback_base_url: "https://api.coingecko.com/api/v3".into(),
            timeout_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// FramePreset
// ---------------------------------------------------------------------------

/// Selects how captured frames are sized before upload.
///
/// | Variant | Output size                              |
/// |---------|------------------------------------------|
/// | Hud     | 320 px wide, height follows aspect ratio |
/// | Legacy  | fixed 400 × 250 (deprecated client)      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePreset {
    Hud,
    Legacy,
}

impl Default for FramePreset {
    fn default() -> Self {
        Self::Hud
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for the client session: where it talks to and how it paces the
/// gesture loop and scene capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the relay (`/search`, `/gesture`).
    pub relay_url: String,
    /// Captioning endpoint that accepts a multipart `image` upload.
    pub caption_url: String,
    /// Gesture poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Grace period between camera acquisition and the describe-scene sample.
    pub warmup_ms: u64,
    /// Frame size preset.
    pub frame_preset: FramePreset,
    /// JPEG quality factor (1–100).
    pub jpeg_quality: u8,
    /// Per-request timeout for relay and captioning calls.
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://localhost:3001".into(),
            caption_url: "http://localhost:5001/api/caption-image".into(),
            poll_interval_ms: 500,
            warmup_ms: 300,
            frame_preset: FramePreset::default(),
            jpeg_quality: 60,
            request_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the external speech recognizer and the speech-output program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether voice search is available at all.  When `false` the session
    /// reports speech recognition as unsupported.
    pub recognition_enabled: bool,
    /// Base URL of an OpenAI-compatible transcription API.
    pub base_url: String,
    /// API key; `None` for local servers.
    pub api_key: Option<String>,
    /// Transcription model identifier.
    pub model: String,
    /// ISO-639-1 language hint.
    pub language: String,
    /// Length of the single-shot listening window in seconds.
    pub listen_secs: u64,
    /// RMS threshold below which captured audio is treated as silence.
    pub silence_threshold: f32,
    /// Text-to-speech program invoked with the utterance as its last
    /// argument (e.g. `espeak`).  `None` disables spoken output.
    pub tts_command: Option<String>,
    /// Extra arguments passed before the utterance.
    pub tts_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            recognition_enabled: true,
            base_url: "http://localhost:8000".into(),
            api_key: None,
            model: "whisper-1".into(),
            language: "en".into(),
            listen_secs: 5,
            silence_threshold: 0.01,
            tts_command: None,
            tts_args: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Which [`Camera`](crate::device::Camera) implementation the session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Replay frames from `source` (headless machines, demos).
    Still,
    /// Live webcam through OpenCV; needs the `webcam` build feature.
    Webcam,
}

impl Default for CameraBackend {
    fn default() -> Self {
        Self::Still
    }
}

/// Camera feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// Image file or directory of frames served by the still backend.
    pub source: PathBuf,
    /// Webcam device index.
    pub device_index: u32,
    /// Capture size requested from the webcam.
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Still,
            source: AppPaths::new().frames_dir,
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use hud_agent::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay server settings.
    pub relay: RelayConfig,
    /// Price oracle and fallback settings.
    pub oracle: OracleConfig,
    /// Client session settings.
    pub session: SessionConfig,
    /// Speech recognition / output settings.
    pub speech: SpeechConfig,
    /// Camera feed settings.
    pub camera: CameraConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
