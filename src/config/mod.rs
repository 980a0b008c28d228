//! Configuration module for the HUD agent.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the relay, the
//! price oracle, the client session and the speech backends, `AppPaths` for
//! cross-platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, CameraBackend, CameraConfig, FramePreset, OracleConfig, RelayConfig, SessionConfig, SpeechConfig,
};
