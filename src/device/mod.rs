//! Camera and microphone access.
//!
//! # Architecture
//!
//! ```text
//!  Mode controllers ──▶ ResourceBroker ──▶ Camera::open      → CameraStream
//!                                     └──▶ Microphone::open  → MicrophoneSession
//! ```
//!
//! The hardware layer is expressed as the [`Camera`] and [`Microphone`]
//! traits so the session can run against real devices, still-image feeds or
//! test doubles.  [`ResourceBroker`] owns the open handles and guarantees at
//! most one camera stream and one microphone session exist at a time.

pub mod broker;
pub mod camera;
pub mod microphone;
pub mod webcam;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{CameraBackend, CameraConfig};

pub use broker::ResourceBroker;
pub use camera::{Camera, CameraStream, StillCamera};
pub use microphone::{CpalMicrophone, Microphone, MicrophoneSession};
pub use webcam::WebcamCamera;

/// The camera backend selected by `config`.
pub fn camera_from_config(config: &CameraConfig) -> Arc<dyn Camera> {
    match config.backend {
        CameraBackend::Still => Arc::new(StillCamera::new(config.source.clone())),
        CameraBackend::Webcam => Arc::new(WebcamCamera::from_config(config)),
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring a camera or microphone.
///
/// Mode controllers turn these into announcements; they never propagate
/// further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The user or the operating system refused access to the device.
    #[error("device permission denied")]
    PermissionDenied,

    /// Any other acquisition failure (no device, busy, unreadable feed …).
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl DeviceError {
    /// Classify an I/O error raised while opening a device or feed.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied,
            _ => DeviceError::Unavailable(err.to_string()),
        }
    }

    /// Classify a backend failure that is only reported as text.  Neither
    /// cpal nor OpenCV has a dedicated permission variant; backends put the
    /// refusal in the message.
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
        {
            DeviceError::PermissionDenied
        } else {
            DeviceError::Unavailable(message)
        }
    }
}
