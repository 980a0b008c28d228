//! Announcer: the single feedback channel of the session.
//!
//! Every user-visible outcome goes through [`Announcer::announce`], which
//!
//! 1. replaces the current status text (observable via [`Announcer::subscribe`]),
//! 2. bumps a monotonic sequence number,
//! 3. cancels whatever the [`SpeechSink`] is saying, then speaks the new text.
//!
//! Announcements are last-write-wins.  Speech is serialized through an async
//! mutex; an utterance still waiting for the mutex when a newer announcement
//! arrives is dropped instead of spoken late.

pub mod sink;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

pub use sink::{CommandSpeechSink, SilentSpeechSink};

/// Status shown before anything has been announced.
pub const INITIAL_STATUS: &str = "Awaiting action...";

// ---------------------------------------------------------------------------
// SpeechSink
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to start speech output: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Spoken-output device.
///
/// `speak` starts an utterance and returns without waiting for it to finish;
/// `cancel` silences whatever is currently being said.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
    async fn cancel(&self);
}

// ---------------------------------------------------------------------------
// AnnouncementRequest
// ---------------------------------------------------------------------------

/// One announcement, numbered in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementRequest {
    pub seq: u64,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Announcer
// ---------------------------------------------------------------------------

pub struct Announcer {
    sink: Arc<dyn SpeechSink>,
    status_tx: watch::Sender<String>,
    /// Guards the sequence bump and the status write so they happen together.
    seq: Mutex<u64>,
    speech: tokio::sync::Mutex<()>,
}

impl Announcer {
    pub fn new(sink: Arc<dyn SpeechSink>) -> Self {
        let (status_tx, _) = watch::channel(INITIAL_STATUS.to_string());
        Self {
            sink,
            status_tx,
            seq: Mutex::new(0),
            speech: tokio::sync::Mutex::new(()),
        }
    }

    /// Publish `text` as the current status and speak it.
    ///
    /// The status update is synchronous; by the time the first `.await`
    /// inside is reached, [`status`](Self::status) already returns `text`.
    /// Speech failures are logged and never surface to the caller.
    pub async fn announce(&self, text: impl Into<String>) {
        let request = self.publish(text.into());
        log::info!("announce: [{}] {}", request.seq, request.text);

        let _speaking = self.speech.lock().await;
        if self.sequence() != request.seq {
            log::debug!("announce: [{}] superseded, not spoken", request.seq);
            return;
        }

        self.sink.cancel().await;
        if let Err(e) = self.sink.speak(&request.text).await {
            log::warn!("announce: speech output failed: {e}");
        }
    }

    fn publish(&self, text: String) -> AnnouncementRequest {
        let mut seq = match self.seq.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *seq += 1;
        self.status_tx.send_replace(text.clone());
        AnnouncementRequest { seq: *seq, text }
    }

    /// The current status text.
    pub fn status(&self) -> String {
        self.status_tx.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    /// Number of announcements issued so far.
    pub fn sequence(&self) -> u64 {
        match self.seq.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Silence any in-flight utterance without changing the status.
    pub async fn silence(&self) {
        self.sink.cancel().await;
    }
}

// ---------------------------------------------------------------------------
// Test doubles (shared with the session tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{SpeechError, SpeechSink};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkEvent {
        Cancel,
        Speak(String),
    }

    /// Records every call; `speak` optionally takes `speak_delay` to return.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<SinkEvent>>,
        pub speak_delay: Duration,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<SinkEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn spoken(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Speak(text) => Some(text),
                    SinkEvent::Cancel => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl SpeechSink for RecordingSink {
        async fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::Speak(text.to_string()));
            if !self.speak_delay.is_zero() {
                tokio::time::sleep(self.speak_delay).await;
            }
            Ok(())
        }

        async fn cancel(&self) {
            self.events.lock().unwrap().push(SinkEvent::Cancel);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
