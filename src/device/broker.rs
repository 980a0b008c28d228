//! Resource broker: single owner of the camera stream and microphone session.
//!
//! ```text
//! acquire_camera ─┬─ slot held?  → return the held stream
//!                 └─ slot empty → Camera::open → store → return
//! release_camera ──▶ take slot → stream.stop()        (no-op when empty)
//! ```
//!
//! Each slot is guarded by an async mutex that stays locked across the
//! hardware `open().await`, so two controllers acquiring at the same time
//! produce exactly one open call and share the resulting handle.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::camera::{Camera, CameraStream};
use super::microphone::{Microphone, MicrophoneSession};
use super::DeviceError;

pub struct ResourceBroker {
    camera: Arc<dyn Camera>,
    microphone: Arc<dyn Microphone>,
    camera_slot: Mutex<Option<Arc<dyn CameraStream>>>,
    microphone_slot: Mutex<Option<Arc<dyn MicrophoneSession>>>,
}

impl ResourceBroker {
    pub fn new(camera: Arc<dyn Camera>, microphone: Arc<dyn Microphone>) -> Self {
        Self {
            camera,
            microphone,
            camera_slot: Mutex::new(None),
            microphone_slot: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Camera (session-wide, shared between modes)
    // -----------------------------------------------------------------------

    /// Return the open camera stream, opening one if none is held.
    pub async fn acquire_camera(&self) -> Result<Arc<dyn CameraStream>, DeviceError> {
        let mut slot = self.camera_slot.lock().await;
        if let Some(stream) = slot.as_ref() {
            if stream.is_live() {
                return Ok(Arc::clone(stream));
            }
            log::debug!("broker: held camera stream was stopped externally, reopening");
        }

        let stream = self.camera.open().await?;
        *slot = Some(Arc::clone(&stream));
        log::debug!("broker: camera acquired");
        Ok(stream)
    }

    /// Stop and forget the camera stream.  Safe to call when nothing is held.
    pub async fn release_camera(&self) {
        if let Some(stream) = self.camera_slot.lock().await.take() {
            stream.stop();
            log::debug!("broker: camera released");
        }
    }

    /// The held camera stream, without opening one.
    pub async fn camera(&self) -> Option<Arc<dyn CameraStream>> {
        self.camera_slot.lock().await.clone()
    }

    pub async fn has_camera(&self) -> bool {
        self.camera_slot.lock().await.is_some()
    }

    // -----------------------------------------------------------------------
    // Microphone (scoped to one voice attempt)
    // -----------------------------------------------------------------------

    /// Return the open microphone session, opening one if none is held.
    pub async fn acquire_microphone(&self) -> Result<Arc<dyn MicrophoneSession>, DeviceError> {
        let mut slot = self.microphone_slot.lock().await;
        if let Some(session) = slot.as_ref() {
            if session.is_live() {
                return Ok(Arc::clone(session));
            }
        }

        let session = self.microphone.open().await?;
        *slot = Some(Arc::clone(&session));
        log::debug!("broker: microphone acquired");
        Ok(session)
    }

    /// Stop and forget the microphone session.  Idempotent.
    pub async fn release_microphone(&self) {
        if let Some(session) = self.microphone_slot.lock().await.take() {
            session.stop();
            log::debug!("broker: microphone released");
        }
    }

    pub async fn has_microphone(&self) -> bool {
        self.microphone_slot.lock().await.is_some()
    }

    /// Release both devices.
    pub async fn release_all(&self) {
        self.release_camera().await;
        self.release_microphone().await;
    }
}

// ---------------------------------------------------------------------------
// Test doubles (shared with the session tests)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
