//! Single-shot speech recognition.
//!
//! [`SpeechRecognizer::recognize_once`] listens on an open microphone session
//! until one utterance has been captured and resolves to its transcript.
//! Cancellation is the caller's job: the voice controller races this future
//! against an abort signal and drops it on abort.
//!
//! [`HttpRecognizer`] records 16 kHz mono audio, trims silence, encodes WAV
//! and uploads it to an OpenAI-compatible `/v1/audio/transcriptions`
//! endpoint (OpenAI, Groq, faster-whisper-server, LocalAI …).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::audio::{samples_to_wav, VadDetector, TARGET_SAMPLE_RATE};
use crate::config::SpeechConfig;
use crate::device::MicrophoneSession;

/// How often the capture loop drains the microphone.
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);
/// Trailing silence that ends an utterance once speech has been heard.
const END_OF_UTTERANCE: Duration = Duration::from_millis(800);

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The microphone session was stopped before an utterance was captured.
    #[error("recognition aborted")]
    Aborted,

    /// Only silence was captured, or the transcript came back empty.
    #[error("no speech detected")]
    NoSpeech,

    /// Transport, API or encoding failure.
    #[error("recognition failed: {0}")]
    Failed(String),
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognitionError::Failed("transcription request timed out".into())
        } else {
            RecognitionError::Failed(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechRecognizer trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture exactly one utterance from `session` and return its text.
    async fn recognize_once(
        &self,
        session: Arc<dyn MicrophoneSession>,
    ) -> Result<String, RecognitionError>;
}

// ---------------------------------------------------------------------------
// HttpRecognizer
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct HttpRecognizer {
    client: reqwest::Client,
    config: SpeechConfig,
    vad: VadDetector,
}

impl HttpRecognizer {
    /// Build a recognizer from `config`.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.listen_secs.max(1) * 2 + 10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            vad: VadDetector::new(config.silence_threshold),
        }
    }

    /// Drain `session` until the listening window closes or the speaker
    /// falls silent after talking.  Returns the trimmed utterance.
    async fn record(&self, session: &dyn MicrophoneSession) -> Result<Vec<f32>, RecognitionError> {
        let window = Duration::from_secs(self.config.listen_secs.max(1));
        let started = tokio::time::Instant::now();

        let mut samples: Vec<f32> = Vec::new();
        let mut heard_speech = false;
        let mut silent_for = Duration::ZERO;

        let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
        ticker.tick().await;

        while started.elapsed() < window {
            ticker.tick().await;
            if !session.is_live() {
                return Err(RecognitionError::Aborted);
            }

            let chunk = session.drain();
            if self.vad.contains_speech(&chunk) {
                heard_speech = true;
                silent_for = Duration::ZERO;
            } else {
                silent_for += DRAIN_INTERVAL;
            }
            samples.extend_from_slice(&chunk);

            if heard_speech && silent_for >= END_OF_UTTERANCE {
                break;
            }
        }

        let voiced = self.vad.trim_silence(&samples);
        if voiced.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }
        log::debug!(
            "recognize: captured {:.2}s of speech",
            voiced.len() as f32 / TARGET_SAMPLE_RATE as f32
        );
        Ok(voiced.to_vec())
    }

    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, RecognitionError> {
        let url = format!(
            "{}/v1/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Failed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone());

        let mut req = self.client.post(&url).multipart(form);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Failed(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Failed(e.to_string()))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn recognize_once(
        &self,
        session: Arc<dyn MicrophoneSession>,
    ) -> Result<String, RecognitionError> {
        // Discard anything buffered before the prompt was announced.
        let _ = session.drain();

        let voiced = self.record(session.as_ref()).await?;
        let wav = samples_to_wav(&voiced, TARGET_SAMPLE_RATE)
            .map_err(|e| RecognitionError::Failed(e.to_string()))?;
        self.transcribe(wav).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
