//! Session orchestrator: the three interactive modes over shared hardware.
//!
//! # Architecture
//!
//! ```text
//!  command ──▶ Session ─┬─ voice::start_voice      ─▶ broker (mic)    ─▶ recognizer ─▶ relay /search
//!                       ├─ gesture::start_gesture  ─▶ broker (camera) ─▶ poll loop  ─▶ relay /gesture
//!                       └─ describe::describe_scene ─▶ broker (camera) ─▶ sampler   ─▶ captioning
//!                                                                     every outcome ─▶ Announcer
//! ```
//!
//! [`Session`] is a cheap handle (`Arc` clone) over the shared inner state;
//! controllers run as methods on it and may be re-entered while a previous
//! call is still outstanding.  Hardware, recognition and transport errors
//! never escape a controller: each one ends in an announcement.

pub mod describe;
pub mod gesture;
pub mod state;
pub mod voice;

use std::sync::Arc;

use tokio::sync::watch;

use crate::announce::Announcer;
use crate::client::HudBackend;
use crate::config::SessionConfig;
use crate::device::{DeviceError, ResourceBroker};
use crate::frame::FrameSampler;
use crate::recognize::SpeechRecognizer;

pub use gesture::NO_HAND_DETECTED;
pub use state::{new_shared_state, PollHandle, SessionState, SharedState, VoicePhase};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Inner {
    config: SessionConfig,
    broker: ResourceBroker,
    sampler: FrameSampler,
    announcer: Announcer,
    backend: Arc<dyn HudBackend>,
    /// `None` when speech recognition is unavailable.
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    state: SharedState,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Assemble a session from its parts.
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use hud_agent::announce::{Announcer, SilentSpeechSink};
    /// use hud_agent::client::HttpBackend;
    /// use hud_agent::config::AppConfig;
    /// use hud_agent::device::{CpalMicrophone, ResourceBroker, StillCamera};
    /// use hud_agent::recognize::HttpRecognizer;
    /// use hud_agent::session::Session;
    ///
    /// # async fn example() {
    /// let config = AppConfig::default();
    /// let broker = ResourceBroker::new(
    ///     Arc::new(StillCamera::new(&config.camera.source)),
    ///     Arc::new(CpalMicrophone::new(30)),
    /// );
    /// let session = Session::new(
    ///     config.session.clone(),
    ///     broker,
    ///     Announcer::new(Arc::new(SilentSpeechSink)),
    ///     Arc::new(HttpBackend::from_config(&config.session)),
    ///     Some(Arc::new(HttpRecognizer::from_config(&config.speech))),
    /// );
    /// session.start_gesture().await;
    /// # }
    /// ```
    pub fn new(
        config: SessionConfig,
        broker: ResourceBroker,
        announcer: Announcer,
        backend: Arc<dyn HudBackend>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> Self {
        let sampler = FrameSampler::new(config.frame_preset.into(), config.jpeg_quality);
        Self {
            inner: Arc::new(Inner {
                config,
                broker,
                sampler,
                announcer,
                backend,
                recognizer,
                state: new_shared_state(),
            }),
        }
    }

    /// Current status text.
    pub fn status(&self) -> String {
        self.inner.announcer.status()
    }

    /// Receiver observing every status change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.inner.announcer.subscribe()
    }

    pub fn voice_phase(&self) -> VoicePhase {
        state::lock(&self.inner.state).voice
    }

    pub fn is_gesture_active(&self) -> bool {
        state::lock(&self.inner.state).gesture_active
    }

    /// Gesture ticks fired by the current (or last) poll loop.
    pub fn gesture_ticks(&self) -> u64 {
        state::lock(&self.inner.state).gesture_ticks()
    }

    pub fn broker(&self) -> &ResourceBroker {
        &self.inner.broker
    }

    /// Tear the session down: cancel the poll loop, abort any recognition,
    /// release both devices and silence speech.  Nothing is announced.
    pub async fn shutdown(&self) {
        {
            let mut st = state::lock(&self.inner.state);
            st.gesture_active = false;
            if let Some(poll) = st.poll.take() {
                poll.stop();
                st.last_ticks = poll.ticks();
            }
            if let Some(abort) = st.voice_abort.take() {
                let _ = abort.send(());
            }
        }
        self.inner.broker.release_all().await;
        self.inner.announcer.silence().await;
        log::info!("session: shut down");
    }

    async fn announce(&self, text: impl Into<String>) {
        self.inner.announcer.announce(text).await;
    }

    /// Announcement for a failed camera acquisition.
    async fn announce_camera_error(&self, err: &DeviceError) {
        log::warn!("session: camera error: {err}");
        let text = match err {
            DeviceError::PermissionDenied => "Camera permission denied.",
            DeviceError::Unavailable(_) => "Camera unavailable.",
        };
        self.announce(text).await;
    }
}

// ---------------------------------------------------------------------------
// Test harness (shared by the controller tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod harness {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::Session;
    use crate::announce::fakes::RecordingSink;
    use crate::announce::{Announcer, SpeechSink};
    use crate::client::{CaptionReply, ClientError, GestureReply, HudBackend, SearchReply};
    use crate::config::SessionConfig;
    use crate::device::broker::fakes::{FakeCamera, FakeMicrophone};
    use crate::device::{Camera, Microphone, MicrophoneSession, ResourceBroker};
    use crate::frame::CaptureFrame;
    use crate::recognize::{RecognitionError, SpeechRecognizer};

    // -- backend -----------------------------------------------------------

    /// Scripted backend; every queue falls back to its default when empty.
    #[derive(Default)]
    pub struct FakeBackend {
        pub searches: Mutex<Vec<String>>,
        pub search_reply: Mutex<Option<Result<SearchReply, String>>>,
        pub gesture_calls: AtomicUsize,
        pub gesture_replies: Mutex<VecDeque<Result<GestureReply, String>>>,
        /// How long each classify call takes to answer.
        pub gesture_delay: Mutex<Duration>,
        pub caption_calls: AtomicUsize,
        pub caption_reply: Mutex<Option<Result<CaptionReply, String>>>,
    }

    impl FakeBackend {
        pub fn searched(&self) -> Vec<String> {
            self.searches.lock().unwrap().clone()
        }

        pub fn gesture_calls(&self) -> usize {
            self.gesture_calls.load(Ordering::SeqCst)
        }

        pub fn caption_calls(&self) -> usize {
            self.caption_calls.load(Ordering::SeqCst)
        }

        pub fn reply_search(&self, reply: Result<SearchReply, String>) {
            *self.search_reply.lock().unwrap() = Some(reply);
        }

        pub fn queue_gesture(&self, reply: Result<GestureReply, String>) {
            self.gesture_replies.lock().unwrap().push_back(reply);
        }

        pub fn delay_gestures(&self, delay: Duration) {
            *self.gesture_delay.lock().unwrap() = delay;
        }

        pub fn reply_caption(&self, reply: Result<CaptionReply, String>) {
            *self.caption_reply.lock().unwrap() = Some(reply);
        }
    }

    fn transport(message: String) -> ClientError {
        ClientError::Transport(message)
    }

    #[async_trait]
    impl HudBackend for FakeBackend {
        async fn search(&self, query: &str) -> Result<SearchReply, ClientError> {
            self.searches.lock().unwrap().push(query.to_string());
            self.search_reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(SearchReply::default()))
                .map_err(transport)
        }

        async fn classify_gesture(&self, _frame: &CaptureFrame) -> Result<GestureReply, ClientError> {
            self.gesture_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .gesture_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GestureReply::default()));
            let delay = *self.gesture_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            reply.map_err(transport)
        }

        async fn caption(&self, _frame: &CaptureFrame) -> Result<CaptionReply, ClientError> {
            self.caption_calls.fetch_add(1, Ordering::SeqCst);
            self.caption_reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(CaptionReply::default()))
                .map_err(transport)
        }
    }

    // -- recognizer --------------------------------------------------------

    /// Resolves to `result` after `delay`; `pending` never resolves.
    pub struct FakeRecognizer {
        pub result: Result<String, RecognitionError>,
        pub delay: Duration,
        pub pending: bool,
        pub calls: AtomicUsize,
    }

    impl FakeRecognizer {
        pub fn hears(text: &str) -> Self {
            Self {
                result: Ok(text.to_string()),
                delay: Duration::ZERO,
                pending: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn fails(err: RecognitionError) -> Self {
            Self {
                result: Err(err),
                ..Self::hears("")
            }
        }

        pub fn never() -> Self {
            Self {
                pending: true,
                ..Self::hears("")
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for FakeRecognizer {
        async fn recognize_once(
            &self,
            _session: Arc<dyn MicrophoneSession>,
        ) -> Result<String, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.pending {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.clone()
        }
    }

    // -- assembled session -------------------------------------------------

    pub struct Harness {
        pub session: Session,
        pub camera: Arc<FakeCamera>,
        pub microphone: Arc<FakeMicrophone>,
        pub backend: Arc<FakeBackend>,
        pub sink: Arc<RecordingSink>,
        pub recognizer: Option<Arc<FakeRecognizer>>,
    }

    impl Harness {
        pub fn new(
            camera: FakeCamera,
            microphone: FakeMicrophone,
            recognizer: Option<FakeRecognizer>,
        ) -> Self {
            let camera = Arc::new(camera);
            let microphone = Arc::new(microphone);
            let backend = Arc::new(FakeBackend::default());
            let sink = Arc::new(RecordingSink::default());
            let recognizer = recognizer.map(Arc::new);

            let broker = ResourceBroker::new(
                Arc::clone(&camera) as Arc<dyn Camera>,
                Arc::clone(&microphone) as Arc<dyn Microphone>,
            );
            let session = Session::new(
                SessionConfig::default(),
                broker,
                Announcer::new(Arc::clone(&sink) as Arc<dyn SpeechSink>),
                Arc::clone(&backend) as Arc<dyn HudBackend>,
                recognizer
                    .as_ref()
                    .map(|r| Arc::clone(r) as Arc<dyn SpeechRecognizer>),
            );

            Self {
                session,
                camera,
                microphone,
                backend,
                sink,
                recognizer,
            }
        }

        pub fn granted() -> Self {
            Self::new(FakeCamera::granted(), FakeMicrophone::granted(), None)
        }

        /// Everything announced so far, in order.
        pub fn announced(&self) -> Vec<String> {
            self.sink.spoken()
        }

        pub fn recognizer(&self) -> &FakeRecognizer {
            self.recognizer.as_deref().expect("harness built without a recognizer")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::harness::{FakeRecognizer, Harness};
    use crate::device::broker::fakes::{FakeCamera, FakeMicrophone};
    use crate::device::{CameraStream, MicrophoneSession};

    #[tokio::test]
    async fn starts_with_initial_status() {
        let h = Harness::granted();
        assert_eq!(h.session.status(), crate::announce::INITIAL_STATUS);
        assert_eq!(h.session.voice_phase().label(), "Idle");
        assert!(!h.session.is_gesture_active());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everything() {
        let h = Harness::new(
            FakeCamera::granted(),
            FakeMicrophone::granted(),
            Some(FakeRecognizer::never()),
        );
        h.session.start_gesture().await;

        let voice = tokio::spawn({
            let session = h.session.clone();
            async move { session.start_voice().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(h.session.broker().has_microphone().await);

        h.session.shutdown().await;
        voice.await.unwrap();

        assert!(!h.session.is_gesture_active());
        assert!(!h.session.broker().has_camera().await);
        assert!(!h.session.broker().has_microphone().await);
        assert!(!h.camera.last_stream().unwrap().is_live());
        assert!(!h.microphone.last_session().unwrap().is_live());
    }

    #[tokio::test]
    async fn session_handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<super::Session>();
    }
}
