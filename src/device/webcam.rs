//! Live webcam backend over OpenCV `videoio`.
//!
//! ```text
//! WebcamCamera::open ─▶ spawn "webcam-capture" thread ─▶ VideoCapture::new(index)
//!                              │  ready / error ◀──────────┘
//!                              └─ loop: read BGR Mat → RGB → WebcamStream::publish
//!                                 until the stream is stopped
//! ```
//!
//! The capture device is created, read and dropped on its own thread; the
//! session only sees the latest converted frame.  Until the first frame
//! arrives `current_frame` returns `None`, which the sampler treats as a
//! camera that is still warming up.
//!
//! OpenCV is only linked with the `webcam` feature.  Without it, opening a
//! webcam fails with [`DeviceError::Unavailable`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use super::camera::{Camera, CameraStream};
use super::DeviceError;
use crate::config::CameraConfig;

/// Pause between reads; about 30 fps.
#[cfg_attr(not(feature = "webcam"), allow(dead_code))]
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// WebcamCamera
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WebcamCamera {
    index: u32,
    width: u32,
    height: u32,
}

impl WebcamCamera {
    pub fn new(index: u32, width: u32, height: u32) -> Self {
        Self {
            index,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.device_index, config.width, config.height)
    }
}

#[async_trait]
impl Camera for WebcamCamera {
    #[cfg(feature = "webcam")]
    async fn open(&self) -> Result<Arc<dyn CameraStream>, DeviceError> {
        let stream = Arc::new(WebcamStream::new());
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let (index, width, height) = (self.index, self.width, self.height);
        let thread_stream = Arc::clone(&stream);
        std::thread::Builder::new()
            .name("webcam-capture".into())
            .spawn(move || capture::run(index, width, height, thread_stream, ready_tx))
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        match ready {
            Ok(Ok(())) => {
                log::info!("camera: webcam {} opened at {width}x{height}", self.index);
                Ok(stream)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Unavailable(
                "capture thread exited before the webcam opened".into(),
            )),
        }
    }

    #[cfg(not(feature = "webcam"))]
    async fn open(&self) -> Result<Arc<dyn CameraStream>, DeviceError> {
        Err(DeviceError::Unavailable(format!(
            "webcam {} requested but this build has no webcam support (enable the `webcam` feature)",
            self.index
        )))
    }
}

// ---------------------------------------------------------------------------
// WebcamStream
// ---------------------------------------------------------------------------

/// Latest frame published by the capture thread.
pub struct WebcamStream {
    latest: Mutex<Option<RgbImage>>,
    live: AtomicBool,
}

impl WebcamStream {
    #[cfg_attr(not(feature = "webcam"), allow(dead_code))]
    fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            live: AtomicBool::new(true),
        }
    }

    /// Replace the held frame.
    #[cfg_attr(not(feature = "webcam"), allow(dead_code))]
    fn publish(&self, frame: RgbImage) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(frame);
        }
    }
}

impl CameraStream for WebcamStream {
    fn current_frame(&self) -> Option<RgbImage> {
        if !self.is_live() {
            return None;
        }
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    fn stop(&self) {
        self.live.store(false, Ordering::Release);
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// OpenCV capture thread
// ---------------------------------------------------------------------------

#[cfg(feature = "webcam")]
mod capture {
    use std::sync::mpsc::SyncSender;
    use std::sync::Arc;

    use image::RgbImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };

    use super::{WebcamStream, FRAME_INTERVAL};
    use crate::device::{CameraStream, DeviceError};

    /// Body of the `webcam-capture` thread: owns the device until the
    /// stream is stopped.
    pub(super) fn run(
        index: u32,
        width: u32,
        height: u32,
        stream: Arc<WebcamStream>,
        ready_tx: SyncSender<Result<(), DeviceError>>,
    ) {
        let mut capture = match open_capture(index, width, height) {
            Ok(capture) => capture,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(()));

        while stream.is_live() {
            match read_frame(&mut capture) {
                Ok(Some(frame)) => stream.publish(frame),
                Ok(None) => {}
                Err(e) => log::warn!("camera: webcam {index} read failed: {e}"),
            }
            std::thread::sleep(FRAME_INTERVAL);
        }
        log::debug!("camera: webcam {index} released");
    }

    fn open_capture(index: u32, width: u32, height: u32) -> Result<VideoCapture, DeviceError> {
        let mut capture =
            VideoCapture::new(index as i32, CAP_ANY).map_err(DeviceError::from_backend)?;
        if !capture.is_opened().map_err(DeviceError::from_backend)? {
            return Err(DeviceError::Unavailable(format!("camera {index} failed to open")));
        }

        capture
            .set(CAP_PROP_FRAME_WIDTH, f64::from(width))
            .map_err(DeviceError::from_backend)?;
        capture
            .set(CAP_PROP_FRAME_HEIGHT, f64::from(height))
            .map_err(DeviceError::from_backend)?;
        Ok(capture)
    }

    /// One BGR frame converted to RGB; `None` when the device had nothing.
    fn read_frame(capture: &mut VideoCapture) -> Result<Option<RgbImage>, DeviceError> {
        let mut bgr = Mat::default();
        if !capture.read(&mut bgr).map_err(DeviceError::from_backend)? || bgr.rows() == 0 {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(DeviceError::from_backend)?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb.data_bytes().map_err(DeviceError::from_backend)?.to_vec();
        Ok(RgbImage::from_raw(width, height, bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn stream_is_cold_until_first_frame() {
        let stream = WebcamStream::new();
        assert!(stream.is_live());
        assert!(stream.current_frame().is_none());

        stream.publish(RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])));
        assert_eq!(stream.current_frame().unwrap().dimensions(), (4, 3));
    }

    #[test]
    fn newest_frame_wins() {
        let stream = WebcamStream::new();
        stream.publish(RgbImage::from_pixel(2, 2, Rgb([10, 10, 10])));
        stream.publish(RgbImage::from_pixel(2, 2, Rgb([200, 200, 200])));
        assert_eq!(stream.current_frame().unwrap().get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn stopped_stream_yields_nothing() {
        let stream = WebcamStream::new();
        stream.publish(RgbImage::new(2, 2));
        stream.stop();
        stream.stop();
        assert!(!stream.is_live());
        assert!(stream.current_frame().is_none());
    }

    #[test]
    fn capture_size_from_config() {
        let mut config = CameraConfig::default();
        config.device_index = 1;
        config.width = 0;
        let camera = WebcamCamera::from_config(&config);
        assert_eq!((camera.index, camera.width, camera.height), (1, 1, 480));
    }

    #[cfg(not(feature = "webcam"))]
    #[tokio::test]
    async fn open_without_webcam_support_is_unavailable() {
        let err = WebcamCamera::new(0, 640, 480).open().await.err().unwrap();
        assert!(matches!(err, DeviceError::Unavailable(_)));
    }
}
