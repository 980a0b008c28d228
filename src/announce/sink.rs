//! Speech sink backends.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::{SpeechError, SpeechSink};
use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// CommandSpeechSink
// ---------------------------------------------------------------------------

/// Speaks by running an external text-to-speech program once per utterance,
/// e.g. `espeak -s 160 "<text>"`.  The utterance is passed as the last
/// argument.
pub struct CommandSpeechSink {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeechSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Mutex::new(None),
        }
    }

    /// Sink for the configured `tts_command`, or `None` when speech output
    /// is disabled.
    pub fn from_config(config: &SpeechConfig) -> Option<Self> {
        config
            .tts_command
            .as_deref()
            .filter(|cmd| !cmd.trim().is_empty())
            .map(|cmd| Self::new(cmd, config.tts_args.clone()))
    }

    #[cfg(test)]
    async fn is_speaking(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

#[async_trait]
impl SpeechSink for CommandSpeechSink {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let mut current = self.current.lock().await;
        if let Some(mut previous) = current.replace(child) {
            let _ = previous.start_kill();
        }
        Ok(())
    }

    async fn cancel(&self) {
        let Some(mut child) = self.current.lock().await.take() else {
            return;
        };
        // Already exited is fine.
        if let Ok(None) = child.try_wait() {
            if let Err(e) = child.kill().await {
                log::warn!("speech: failed to stop {}: {e}", self.program);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SilentSpeechSink
// ---------------------------------------------------------------------------

/// Used when no speech program is configured: status only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeechSink;

#[async_trait]
impl SpeechSink for SilentSpeechSink {
    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Ok(())
    }

    async fn cancel(&self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
