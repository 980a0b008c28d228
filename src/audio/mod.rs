//! Audio helpers shared by the microphone backend and the speech recognizer.
//!
//! ```text
//! cpal callback → stereo_to_mono → resample_to_16k → RingBuffer
//!   (recognizer) drain → VadDetector::trim_silence → samples_to_wav → upload
//! ```

pub mod buffer;
pub mod resample;
pub mod vad;
pub mod wav;

pub use buffer::RingBuffer;
pub use resample::{resample_to_16k, stereo_to_mono, TARGET_SAMPLE_RATE};
pub use vad::VadDetector;
pub use wav::{samples_to_wav, WavError};
