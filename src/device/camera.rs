//! Camera hardware interface and the still-image feed backend.
//!
//! [`Camera::open`] hands back a shared [`CameraStream`]; the stream yields
//! the latest frame on demand and is stopped explicitly by the broker.
//!
//! [`StillCamera`] serves frames from an image file, or cycles through a
//! directory of frames in file-name order.  It stands in for a webcam on
//! headless machines and in demos.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use super::DeviceError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A live camera stream.
pub trait CameraStream: Send + Sync {
    /// The current frame, or `None` while the stream is warming up or after
    /// it has been stopped.
    fn current_frame(&self) -> Option<RgbImage>;

    /// Stop all tracks.  Idempotent.
    fn stop(&self);

    /// `false` once [`stop`](Self::stop) has been called.
    fn is_live(&self) -> bool;
}

/// Camera hardware: opens a new stream on each call.
///
/// Deduplication of concurrent opens is the broker's job, not the camera's.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn CameraStream>, DeviceError>;
}

// ---------------------------------------------------------------------------
// StillCamera
// ---------------------------------------------------------------------------

/// Camera backed by an image file or a directory of frames.
#[derive(Debug, Clone)]
pub struct StillCamera {
    source: PathBuf,
}

impl StillCamera {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl Camera for StillCamera {
    /// Decode every frame up front on the blocking pool.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::PermissionDenied`]: the feed is not readable.
    /// - [`DeviceError::Unavailable`]: missing path, no frames, or a frame
    ///   that fails to decode.
    async fn open(&self) -> Result<Arc<dyn CameraStream>, DeviceError> {
        let source = self.source.clone();
        let frames = tokio::task::spawn_blocking(move || load_frames(&source))
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))??;

        log::info!(
            "camera: opened {} frame(s) from {}",
            frames.len(),
            self.source.display()
        );
        Ok(Arc::new(StillStream::new(frames)))
    }
}

fn load_frames(source: &Path) -> Result<Vec<RgbImage>, DeviceError> {
    let meta = std::fs::metadata(source).map_err(|e| DeviceError::from_io(&e))?;

    let paths = if meta.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(source)
            .map_err(|e| DeviceError::from_io(&e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image_file(p))
            .collect();
        paths.sort();
        paths
    } else {
        vec![source.to_path_buf()]
    };

    if paths.is_empty() {
        return Err(DeviceError::Unavailable(format!(
            "no frames in {}",
            source.display()
        )));
    }

    paths.iter().map(|p| decode_frame(p)).collect()
}

fn decode_frame(path: &Path) -> Result<RgbImage, DeviceError> {
    match image::open(path) {
        Ok(img) => Ok(img.to_rgb8()),
        Err(image::ImageError::IoError(e)) => Err(DeviceError::from_io(&e)),
        Err(e) => Err(DeviceError::Unavailable(format!("{}: {e}", path.display()))),
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png"
            )
        })
}

// ---------------------------------------------------------------------------
// StillStream
// ---------------------------------------------------------------------------

/// Stream over pre-decoded frames; each read advances to the next frame.
pub struct StillStream {
    frames: Vec<RgbImage>,
    cursor: AtomicUsize,
    live: AtomicBool,
}

impl StillStream {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
            live: AtomicBool::new(true),
        }
    }
}

impl CameraStream for StillStream {
    fn current_frame(&self) -> Option<RgbImage> {
        if !self.is_live() || self.frames.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Some(self.frames[idx].clone())
    }

    fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
