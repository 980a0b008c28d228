//! Microphone hardware interface and the `cpal` capture backend.
//!
//! [`CpalMicrophone`] opens the default input device.  `cpal::Stream` is not
//! `Send` on every platform, so the stream is built, played and dropped on a
//! dedicated `mic-capture` thread; the async side only holds the shared
//! sample buffer and a stop channel.  Samples are downmixed and resampled to
//! 16 kHz mono inside the callback.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::DeviceError;
use crate::audio::{resample_to_16k, stereo_to_mono, RingBuffer, TARGET_SAMPLE_RATE};

/// Samples shared between the capture callback and the recognizer.
type SharedSamples = Arc<Mutex<RingBuffer<f32>>>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An open microphone session delivering 16 kHz mono samples.
pub trait MicrophoneSession: Send + Sync {
    /// Take every sample captured since the previous call.
    fn drain(&self) -> Vec<f32>;

    /// Stop capturing.  Idempotent.
    fn stop(&self);

    /// `false` once [`stop`](Self::stop) has been called.
    fn is_live(&self) -> bool;
}

/// Microphone hardware: opens a new capture session on each call.
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn MicrophoneSession>, DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Default-input-device microphone built on `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use hud_agent::device::{CpalMicrophone, Microphone};
///
/// # async fn example() {
/// let mic = CpalMicrophone::new(30);
/// let session = mic.open().await.unwrap();
/// // ... later
/// let samples = session.drain();
/// session.stop();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    /// Seconds of audio retained before the oldest samples are overwritten.
    buffer_secs: u64,
}

impl CpalMicrophone {
    pub fn new(buffer_secs: u64) -> Self {
        Self {
            buffer_secs: buffer_secs.max(1),
        }
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    /// Spawn the capture thread and wait until the stream is playing.
    ///
    /// # Errors
    ///
    /// [`DeviceError::PermissionDenied`] when the backend reports an access
    /// refusal, [`DeviceError::Unavailable`] for everything else.
    async fn open(&self) -> Result<Arc<dyn MicrophoneSession>, DeviceError> {
        let capacity = TARGET_SAMPLE_RATE as usize * self.buffer_secs as usize;
        let buffer: SharedSamples = Arc::new(Mutex::new(RingBuffer::new(capacity)));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_buffer = Arc::clone(&buffer);
        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture(thread_buffer, ready_tx, stop_rx))
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        match ready {
            Ok(Ok(())) => {
                log::info!("microphone: capture started");
                Ok(Arc::new(CpalSession {
                    buffer,
                    stop_tx: Mutex::new(Some(stop_tx)),
                }))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Unavailable(
                "capture thread exited before the stream started".into(),
            )),
        }
    }
}

/// Body of the `mic-capture` thread: owns the stream until told to stop.
fn run_capture(
    buffer: SharedSamples,
    ready_tx: mpsc::SyncSender<Result<(), DeviceError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match build_stream(buffer) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Returns on an explicit stop or when the session is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("microphone: capture stream closed");
}

fn build_stream(buffer: SharedSamples) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        DeviceError::Unavailable("no input device found on the default audio host".into())
    })?;

    let supported = device.default_input_config().map_err(DeviceError::from_backend)?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = stereo_to_mono(data, channels);
                let resampled = resample_to_16k(&mono, sample_rate);
                if let Ok(mut buf) = buffer.lock() {
                    buf.push_slice(&resampled);
                }
            },
            |err: cpal::StreamError| {
                log::error!("microphone: cpal stream error: {err}");
            },
            None,
        )
        .map_err(DeviceError::from_backend)?;

    stream.play().map_err(DeviceError::from_backend)?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// CpalSession
// ---------------------------------------------------------------------------

struct CpalSession {
    buffer: SharedSamples,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl MicrophoneSession for CpalSession {
    fn drain(&self) -> Vec<f32> {
        match self.buffer.lock() {
            Ok(mut buf) => buf.drain(),
            Err(_) => Vec::new(),
        }
    }

    fn stop(&self) {
        if let Ok(mut guard) = self.stop_tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(());
            }
        }
    }

    fn is_live(&self) -> bool {
        self.stop_tx.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl Drop for CpalSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_channel() -> (CpalSession, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let session = CpalSession {
            buffer: Arc::new(Mutex::new(RingBuffer::new(16))),
            stop_tx: Mutex::new(Some(tx)),
        };
        (session, rx)
    }

    #[test]
    fn drain_takes_captured_samples() {
        let (session, _rx) = session_with_channel();
        session.buffer.lock().unwrap().push_slice(&[0.1, 0.2]);
        assert_eq!(session.drain(), vec![0.1, 0.2]);
        assert!(session.drain().is_empty());
    }

    #[test]
    fn stop_signals_capture_thread_once() {
        let (session, rx) = session_with_channel();
        assert!(session.is_live());

        session.stop();
        session.stop();

        assert!(!session.is_live());
        assert!(rx.try_recv().is_ok());
        // Sender is gone after the first stop.
        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }

    #[test]
    fn dropping_session_stops_capture() {
        let (session, rx) = session_with_channel();
        drop(session);
        assert!(rx.try_recv().is_ok());
    }
}
