//! Gesture mode controller and its poll loop.
//!
//! ```text
//! start_gesture ─▶ gesture_active = true ─▶ acquire camera
//!                    ├─ refused → gesture_active = false, announce denial
//!                    └─ ok      → install PollHandle, "Gesture mode active"
//!
//! poll loop (every poll_interval, first tick one interval after start)
//!   └─ spawn tick n ─▶ sample frame ─▶ relay /gesture
//!                        None → skip     ├─ label            → announce label
//!                                        ├─ no_hand_detected → nothing
//!                                        └─ offline          → "Gesture server offline."
//! ```
//!
//! Each tick runs as its own task so a slow classifier never delays the
//! schedule; overlapping ticks only race on the status, which is
//! last-write-wins.  Stopping aborts the loop task; ticks already spawned
//! finish and may still announce.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use super::state::{self, PollHandle};
use super::Session;

/// Classifier label meaning "no hand in frame"; never announced.
pub const NO_HAND_DETECTED: &str = "no_hand_detected";

impl Session {
    /// Enter gesture mode.  No-op while already active.
    pub async fn start_gesture(&self) {
        let epoch = {
            let mut st = state::lock(&self.inner.state);
            if st.gesture_active {
                log::debug!("gesture: already active");
                return;
            }
            st.gesture_active = true;
            st.gesture_epoch += 1;
            st.gesture_epoch
        };

        if let Err(e) = self.inner.broker.acquire_camera().await {
            {
                let mut st = state::lock(&self.inner.state);
                if st.gesture_epoch == epoch {
                    st.gesture_active = false;
                }
            }
            self.announce_camera_error(&e).await;
            return;
        }

        {
            let mut st = state::lock(&self.inner.state);
            if !st.gesture_active || st.gesture_epoch != epoch {
                log::debug!("gesture: stopped while the camera was opening");
                return;
            }
            st.poll = Some(self.spawn_poll_loop());
        }

        log::info!(
            "gesture: polling every {} ms",
            self.inner.config.poll_interval().as_millis()
        );
        self.announce("Gesture mode active").await;
    }

    /// Leave gesture mode.  Safe to call repeatedly; always announces.
    pub async fn stop_gesture(&self) {
        {
            let mut st = state::lock(&self.inner.state);
            st.gesture_active = false;
            if let Some(poll) = st.poll.take() {
                poll.stop();
                st.last_ticks = poll.ticks();
                log::info!("gesture: stopped after {} tick(s)", st.last_ticks);
            }
        }
        self.inner.broker.release_camera().await;
        self.announce("Stopped.").await;
    }

    fn spawn_poll_loop(&self) -> PollHandle {
        let ticks = Arc::new(AtomicU64::new(0));
        let period = self.inner.config.poll_interval();
        let session = self.clone();
        let counter = Arc::clone(&ticks);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                let session = session.clone();
                tokio::spawn(async move { session.gesture_tick(n).await });
            }
        });

        PollHandle::new(task, ticks)
    }

    /// One capture-and-classify cycle.
    pub(crate) async fn gesture_tick(&self, n: u64) {
        let Some(stream) = self.inner.broker.camera().await else {
            log::debug!("gesture: tick {n} has no camera");
            return;
        };

        let frame = match self.inner.sampler.sample(stream.as_ref()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::debug!("gesture: tick {n} camera not ready");
                return;
            }
            Err(e) => {
                log::warn!("gesture: tick {n} frame capture failed: {e}");
                return;
            }
        };

        match self.inner.backend.classify_gesture(&frame).await {
            Ok(reply) => match reply.label() {
                Some(label) if label != NO_HAND_DETECTED => {
                    log::debug!("gesture: tick {n} → {label}");
                    self.announce(label).await;
                }
                _ => {}
            },
            Err(e) => {
                log::warn!("gesture: tick {n} offline: {e}");
                self.announce("Gesture server offline.").await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
