//! Session state machine and shared mutable state.
//!
//! [`VoicePhase`] tracks the voice controller.  [`SessionState`] holds the
//! flags and handles the controllers coordinate through; it sits behind
//! [`SharedState`] (`Arc<Mutex<SessionState>>`).  Locks are held only for
//! short critical sections and never across an `.await`.
//!
//! The status text is not stored here: it lives in the announcer's watch
//! channel so every writer goes through one place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// VoicePhase
// ---------------------------------------------------------------------------

/// States of the voice controller.
///
/// ```text
/// Idle ──start_voice──▶ Listening ──utterance──▶ Searching ──reply──▶ Idle
///                                 ──error / abort──────────────────▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoicePhase {
    #[default]
    Idle,

    /// The microphone is held and a recognition is in flight.
    Listening,

    /// The query has been sent to the relay.  A new voice attempt may start
    /// while a search is outstanding.
    Searching,
}

impl VoicePhase {
    /// `true` while the microphone belongs to a voice attempt.
    ///
    /// ```
    /// use hud_agent::session::VoicePhase;
    ///
    /// assert!(!VoicePhase::Idle.is_busy());
    /// assert!(VoicePhase::Listening.is_busy());
    /// assert!(!VoicePhase::Searching.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, VoicePhase::Listening)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoicePhase::Idle => "Idle",
            VoicePhase::Listening => "Listening",
            VoicePhase::Searching => "Searching",
        }
    }
}

// ---------------------------------------------------------------------------
// PollHandle
// ---------------------------------------------------------------------------

/// Handle to the running gesture poll loop.
///
/// Dropping the handle does not stop the loop; call [`stop`](Self::stop).
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl PollHandle {
    pub fn new(task: JoinHandle<()>, ticks: Arc<AtomicU64>) -> Self {
        Self { task, ticks }
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Abort the loop.  Tick tasks already spawned run to completion.
    pub fn stop(&self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SessionState {
    pub voice: VoicePhase,

    /// Abort signal for the in-flight recognition, present while listening.
    pub voice_abort: Option<oneshot::Sender<()>>,

    /// Set as soon as gesture mode is requested, before the camera opens.
    pub gesture_active: bool,

    /// Bumped on every `start_gesture` so a start that lost a race with
    /// stop/start can tell it is stale.
    pub gesture_epoch: u64,

    /// Present iff gesture mode is active and the camera has been acquired.
    pub poll: Option<PollHandle>,

    /// Tick count of the most recent poll loop, kept after it stops.
    pub last_ticks: u64,
}

impl SessionState {
    /// Ticks of the running loop, or of the last one if none is running.
    pub fn gesture_ticks(&self) -> u64 {
        self.poll
            .as_ref()
            .map(PollHandle::ticks)
            .unwrap_or(self.last_ticks)
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Cheap to clone (`Arc` clone).  Use [`lock`] rather than locking directly.
pub type SharedState = Arc<Mutex<SessionState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::default()))
}

/// Lock `state`, recovering the data if a previous holder panicked.
pub fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
