//! Voice search controller.
//!
//! ```text
//! start_voice
//!   ├─ no recognizer        → "Speech recognition not supported."
//!   ├─ already listening    → no-op
//!   ├─ microphone refused   → "Microphone permission denied."
//!   └─ "Listening..." → recognize_once ⟂ abort signal
//!         ├─ aborted        → silent
//!         ├─ error / empty  → "Microphone error. Please try again."
//!         └─ query          → "Searching: <query>" → relay /search
//!               ├─ summary  → <summary>  (or "No result found.")
//!               └─ offline  → "Search server not responding."
//! ```
//!
//! The microphone is released and the listening phase cleared on every exit
//! path, before the search is sent.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::state::{self, VoicePhase};
use super::Session;
use crate::device::DeviceError;
use crate::recognize::RecognitionError;

impl Session {
    /// Run one voice search.  Returns once the outcome has been announced.
    pub async fn start_voice(&self) {
        let Some(recognizer) = self.inner.recognizer.clone() else {
            self.announce("Speech recognition not supported.").await;
            return;
        };

        let abort_rx = {
            let mut st = state::lock(&self.inner.state);
            if st.voice.is_busy() {
                log::debug!("voice: already listening, ignoring start");
                return;
            }
            st.voice = VoicePhase::Listening;
            let (tx, rx) = oneshot::channel();
            st.voice_abort = Some(tx);
            rx
        };

        let microphone = match self.inner.broker.acquire_microphone().await {
            Ok(microphone) => microphone,
            Err(e) => {
                log::warn!("voice: microphone unavailable: {e}");
                self.finish_listening();
                let text = match e {
                    DeviceError::PermissionDenied => "Microphone permission denied.",
                    DeviceError::Unavailable(_) => "Microphone error. Please try again.",
                };
                self.announce(text).await;
                return;
            }
        };

        self.announce("Listening...").await;

        let outcome = tokio::select! {
            result = recognizer.recognize_once(Arc::clone(&microphone)) => Some(result),
            Ok(()) = abort_rx => None,
        };

        self.inner.broker.release_microphone().await;
        self.finish_listening();

        let query = match outcome {
            None | Some(Err(RecognitionError::Aborted)) => {
                log::info!("voice: recognition aborted");
                return;
            }
            Some(Err(e)) => {
                log::warn!("voice: recognition failed: {e}");
                self.announce("Microphone error. Please try again.").await;
                return;
            }
            Some(Ok(text)) if text.trim().is_empty() => {
                log::warn!("voice: empty transcript");
                self.announce("Microphone error. Please try again.").await;
                return;
            }
            Some(Ok(text)) => text.trim().to_string(),
        };

        self.search(&query).await;
    }

    /// Abort the in-flight recognition, if any.  The attempt ends silently.
    pub fn abort_voice(&self) {
        let abort = state::lock(&self.inner.state).voice_abort.take();
        if let Some(abort) = abort {
            let _ = abort.send(());
            log::debug!("voice: abort requested");
        }
    }

    async fn search(&self, query: &str) {
        self.set_searching(true);
        self.announce(format!("Searching: {query}")).await;

        let text = match self.inner.backend.search(query).await {
            Ok(reply) => {
                if let Some(source) = reply.source.as_deref() {
                    log::debug!("voice: answer sourced from {source}");
                }
                reply
                    .summary_text()
                    .unwrap_or("No result found.")
                    .to_string()
            }
            Err(e) => {
                log::warn!("voice: search failed: {e}");
                "Search server not responding.".to_string()
            }
        };

        self.set_searching(false);
        self.announce(text).await;
    }

    fn finish_listening(&self) {
        let mut st = state::lock(&self.inner.state);
        st.voice = VoicePhase::Idle;
        st.voice_abort = None;
    }

    /// Enter or leave `Searching` without disturbing a newer attempt that is
    /// already listening.
    fn set_searching(&self, searching: bool) {
        let mut st = state::lock(&self.inner.state);
        match (searching, st.voice) {
            (true, VoicePhase::Idle) => st.voice = VoicePhase::Searching,
            (false, VoicePhase::Searching) => st.voice = VoicePhase::Idle,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::harness::{FakeRecognizer, Harness};
    use super::*;
    use crate::client::SearchReply;
    use crate::device::broker::fakes::{FakeCamera, FakeMicrophone};
    use crate::device::MicrophoneSession;

    fn harness(recognizer: FakeRecognizer) -> Harness {
        Harness::new(
            FakeCamera::granted(),
            FakeMicrophone::granted(),
            Some(recognizer),
        )
    }

    #[tokio::test]
    async fn no_recognizer_is_unsupported() {
        let h = Harness::granted();
        h.session.start_voice().await;

        assert_eq!(h.announced(), vec!["Speech recognition not supported."]);
        assert_eq!(h.microphone.opens(), 0);
    }

    #[tokio::test]
    async fn microphone_denied() {
        let h = Harness::new(
            FakeCamera::granted(),
            FakeMicrophone::denied(),
            Some(FakeRecognizer::hears("hello")),
        );
        h.session.start_voice().await;

        assert_eq!(h.announced(), vec!["Microphone permission denied."]);
        assert_eq!(h.recognizer().calls(), 0);
        assert_eq!(h.session.voice_phase(), VoicePhase::Idle);
    }

    #[tokio::test]
    async fn successful_search_announces_summary() {
        let h = harness(FakeRecognizer::hears("what is the price of btc"));
        h.backend.reply_search(Ok(SearchReply {
            summary: Some("BTC price: 64000.12 USD".into()),
            source: Some("ftso".into()),
        }));

        h.session.start_voice().await;

        assert_eq!(
            h.announced(),
            vec![
                "Listening...",
                "Searching: what is the price of btc",
                "BTC price: 64000.12 USD",
            ]
        );
        assert_eq!(h.backend.searched(), vec!["what is the price of btc"]);
        assert!(!h.session.broker().has_microphone().await);
        assert!(!h.microphone.last_session().unwrap().is_live());
        assert_eq!(h.session.voice_phase(), VoicePhase::Idle);
    }

    #[tokio::test]
    async fn missing_summary_is_no_result() {
        let h = harness(FakeRecognizer::hears("weather"));
        h.session.start_voice().await;
        assert_eq!(h.session.status(), "No result found.");
    }

    #[tokio::test]
    async fn search_transport_failure() {
        let h = harness(FakeRecognizer::hears("weather"));
        h.backend.reply_search(Err("connection refused".into()));

        h.session.start_voice().await;
        assert_eq!(h.session.status(), "Search server not responding.");
    }

    #[tokio::test]
    async fn recognition_error_is_microphone_error() {
        let h = harness(FakeRecognizer::fails(RecognitionError::NoSpeech));
        h.session.start_voice().await;

        assert_eq!(
            h.announced(),
            vec!["Listening...", "Microphone error. Please try again."]
        );
        assert!(h.backend.searched().is_empty());
        assert!(!h.session.broker().has_microphone().await);
    }

    #[tokio::test]
    async fn blank_transcript_is_microphone_error() {
        let h = harness(FakeRecognizer::hears("   "));
        h.session.start_voice().await;
        assert_eq!(h.session.status(), "Microphone error. Please try again.");
        assert!(h.backend.searched().is_empty());
    }

    #[tokio::test]
    async fn aborted_recognition_is_silent() {
        let h = harness(FakeRecognizer::fails(RecognitionError::Aborted));
        h.session.start_voice().await;
        assert_eq!(h.announced(), vec!["Listening..."]);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_signal_ends_attempt_silently() {
        let h = harness(FakeRecognizer::never());

        let task = tokio::spawn({
            let session = h.session.clone();
            async move { session.start_voice().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.session.voice_phase(), VoicePhase::Listening);

        h.session.abort_voice();
        task.await.unwrap();

        assert_eq!(h.announced(), vec!["Listening..."]);
        assert_eq!(h.session.voice_phase(), VoicePhase::Idle);
        assert!(!h.session.broker().has_microphone().await);
    }

    #[tokio::test]
    async fn abort_without_attempt_is_noop() {
        let h = harness(FakeRecognizer::hears("x"));
        h.session.abort_voice();
        assert!(h.announced().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_listening_does_not_start_second_recognition() {
        let mut recognizer = FakeRecognizer::hears("bitcoin price");
        recognizer.delay = Duration::from_millis(100);
        let h = harness(recognizer);

        let first = tokio::spawn({
            let session = h.session.clone();
            async move { session.start_voice().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.session.start_voice().await;
        first.await.unwrap();

        assert_eq!(h.recognizer().calls(), 1);
        assert_eq!(h.microphone.opens(), 1);
        assert_eq!(h.backend.searched().len(), 1);
    }

    #[tokio::test]
    async fn listening_again_after_completion() {
        let h = harness(FakeRecognizer::hears("eth rate"));
        h.session.start_voice().await;
        h.session.start_voice().await;

        assert_eq!(h.recognizer().calls(), 2);
        assert_eq!(h.microphone.opens(), 2);
    }
}
