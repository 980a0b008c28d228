//! Frame sampler: current camera frame → downscaled JPEG payload.
//!
//! A stream that has not produced a frame yet (or whose frame reports zero
//! width or height) samples as `Ok(None)`.  That is the normal warm-up
//! condition and callers skip the tick rather than treating it as a failure.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;

use crate::config::FramePreset;
use crate::device::CameraStream;

/// Output width used by the HUD client.
pub const HUD_FRAME_WIDTH: u32 = 320;
/// Fixed output size used by the legacy relay client.
pub const LEGACY_FRAME_SIZE: (u32, u32) = (400, 250);

// ---------------------------------------------------------------------------
// FrameError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("encoder task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// FrameTarget
// ---------------------------------------------------------------------------

/// Output geometry of a sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    /// Fixed width, height follows the source aspect ratio.
    Width(u32),
    /// Exact output size regardless of the source aspect ratio.
    Fixed { width: u32, height: u32 },
}

impl FrameTarget {
    /// Output size for a `src_w × src_h` frame, `None` if the source has no
    /// pixels.  A derived height is rounded down, never below 1.
    ///
    /// ```
    /// use hud_agent::frame::FrameTarget;
    ///
    /// assert_eq!(FrameTarget::Width(320).output_size(640, 480), Some((320, 240)));
    /// assert_eq!(FrameTarget::Width(320).output_size(0, 480), None);
    /// ```
    pub fn output_size(self, src_w: u32, src_h: u32) -> Option<(u32, u32)> {
        if src_w == 0 || src_h == 0 {
            return None;
        }
        match self {
            FrameTarget::Width(width) => {
                let height = (f64::from(src_h) * f64::from(width) / f64::from(src_w)).floor();
                Some((width, (height as u32).max(1)))
            }
            FrameTarget::Fixed { width, height } => Some((width, height)),
        }
    }
}

impl From<FramePreset> for FrameTarget {
    fn from(preset: FramePreset) -> Self {
        match preset {
            FramePreset::Hud => FrameTarget::Width(HUD_FRAME_WIDTH),
            FramePreset::Legacy => FrameTarget::Fixed {
                width: LEGACY_FRAME_SIZE.0,
                height: LEGACY_FRAME_SIZE.1,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureFrame
// ---------------------------------------------------------------------------

/// One encoded frame, produced and consumed within a single request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    /// Baseline JPEG bytes.
    pub jpeg: Vec<u8>,
    /// Quality factor the payload was encoded with.
    pub quality: u8,
}

impl CaptureFrame {
    /// `data:image/jpeg;base64,...` form sent to the gesture classifier.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.jpeg)
        )
    }
}

// ---------------------------------------------------------------------------
// FrameSampler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    target: FrameTarget,
    quality: u8,
}

impl FrameSampler {
    pub fn new(target: FrameTarget, quality: u8) -> Self {
        Self {
            target,
            quality: quality.clamp(1, 100),
        }
    }

    /// Resize and encode `frame`.  Same input, same target, same encoder
    /// → byte-identical output.
    pub fn encode(&self, frame: &RgbImage) -> Result<Option<CaptureFrame>, FrameError> {
        let (src_w, src_h) = frame.dimensions();
        let Some((width, height)) = self.target.output_size(src_w, src_h) else {
            return Ok(None);
        };

        let resized = image::imageops::resize(frame, width, height, FilterType::Triangle);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&resized)?;

        Ok(Some(CaptureFrame {
            width,
            height,
            jpeg,
            quality: self.quality,
        }))
    }

    /// Sample the stream's current frame.  Encoding runs on the blocking pool.
    pub async fn sample(
        &self,
        stream: &dyn CameraStream,
    ) -> Result<Option<CaptureFrame>, FrameError> {
        let Some(frame) = stream.current_frame() else {
            return Ok(None);
        };
        let sampler = *self;
        tokio::task::spawn_blocking(move || sampler.encode(&frame))
            .await
            .map_err(|e| FrameError::Task(e.to_string()))?
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(FramePreset::default().into(), 60)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    #[test]
    fn hud_target_preserves_aspect_ratio() {
        let target = FrameTarget::from(FramePreset::Hud);
        assert_eq!(target.output_size(640, 480), Some((320, 240)));
        assert_eq!(target.output_size(1280, 720), Some((320, 180)));
        assert_eq!(target.output_size(1000, 1), Some((320, 1)));
        assert_eq!(target.output_size(1000, 333), Some((320, 106)));
        assert_eq!(target.output_size(3, 2), Some((320, 213)));
    }

    #[test]
    fn legacy_target_is_fixed() {
        let target = FrameTarget::from(FramePreset::Legacy);
        assert_eq!(target.output_size(640, 480), Some((400, 250)));
    }

    #[test]
    fn zero_dimension_source_has_no_output() {
        assert_eq!(FrameTarget::Width(320).output_size(640, 0), None);
    }

    #[test]
    fn encode_produces_jpeg_of_target_size() {
        let sampler = FrameSampler::new(FrameTarget::Width(320), 60);
        let frame = sampler.encode(&gradient(640, 480)).unwrap().unwrap();

        assert_eq!((frame.width, frame.height), (320, 240));
        assert_eq!(frame.quality, 60);
        // SOI marker
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&frame.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn encode_is_deterministic() {
        let sampler = FrameSampler::new(FrameTarget::Width(320), 60);
        let source = gradient(200, 100);
        let a = sampler.encode(&source).unwrap().unwrap();
        let b = sampler.encode(&source).unwrap().unwrap();
        assert_eq!(a.jpeg, b.jpeg);
    }

    #[test]
    fn empty_frame_encodes_to_none() {
        let sampler = FrameSampler::default();
        assert!(sampler.encode(&RgbImage::new(0, 0)).unwrap().is_none());
    }

    #[test]
    fn data_uri_prefix() {
        let frame = CaptureFrame {
            width: 1,
            height: 1,
            jpeg: vec![1, 2, 3],
            quality: 60,
        };
        assert_eq!(frame.to_data_uri(), "data:image/jpeg;base64,AQID");
    }

    #[tokio::test]
    async fn cold_stream_samples_none() {
        use crate::device::broker::fakes::FakeStream;
        use std::sync::atomic::AtomicBool;

        let stream = FakeStream {
            frame: None,
            live: AtomicBool::new(true),
        };
        let sampled = FrameSampler::default().sample(&stream).await.unwrap();
        assert!(sampled.is_none());
    }

    #[tokio::test]
    async fn warm_stream_samples_frame() {
        use crate::device::broker::fakes::FakeStream;
        use std::sync::atomic::AtomicBool;

        let stream = FakeStream {
            frame: Some(gradient(64, 48)),
            live: AtomicBool::new(true),
        };
        let sampled = FrameSampler::default().sample(&stream).await.unwrap().unwrap();
        assert_eq!((sampled.width, sampled.height), (320, 240));
    }
}
