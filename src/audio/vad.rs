//! Energy-based speech detection on 16 kHz mono samples.
//!
//! Samples are judged in 30 ms frames (480 samples).  A frame is speech when
//! its RMS amplitude exceeds the threshold.  The recognizer uses
//! [`VadDetector::contains_speech`] to spot the end of an utterance and
//! [`VadDetector::trim_silence`] to cut the clip it uploads.

/// 30 ms at 16 kHz.
const FRAME_SAMPLES: usize = 480;

/// Energy-based speech detector.
///
/// ```rust
/// use hud_agent::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
/// let mut clip = vec![0.0_f32; 480];
/// clip.extend(vec![0.5_f32; 480]);
/// clip.extend(vec![0.0_f32; 480]);
///
/// assert!(vad.contains_speech(&clip));
/// assert_eq!(vad.trim_silence(&clip).len(), 480);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VadDetector {
    rms_threshold: f32,
}

impl VadDetector {
    /// `rms_threshold` is an amplitude in `[0.0, 1.0]`; 0.01 suits a quiet
    /// room.
    pub fn new(rms_threshold: f32) -> Self {
        Self { rms_threshold }
    }

    fn is_speech(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let energy = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        energy.sqrt() > self.rms_threshold
    }

    /// `true` when any frame of `samples` is speech.
    pub fn contains_speech(&self, samples: &[f32]) -> bool {
        samples.chunks(FRAME_SAMPLES).any(|frame| self.is_speech(frame))
    }

    /// Sub-slice from the first speech frame through the last one; empty when
    /// nothing is speech.
    pub fn trim_silence<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        let frames: Vec<bool> = samples
            .chunks(FRAME_SAMPLES)
            .map(|frame| self.is_speech(frame))
            .collect();

        let (Some(first), Some(last)) = (
            frames.iter().position(|&speech| speech),
            frames.iter().rposition(|&speech| speech),
        ) else {
            return &samples[..0];
        };

        let start = first * FRAME_SAMPLES;
        let end = ((last + 1) * FRAME_SAMPLES).min(samples.len());
        &samples[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(pre: usize, speech: usize, post: usize) -> Vec<f32> {
        let mut v = vec![0.0_f32; pre];
        v.extend(vec![0.3_f32; speech]);
        v.extend(vec![0.0_f32; post]);
        v
    }

    #[test]
    fn trims_to_speech_frames() {
        let vad = VadDetector::new(0.01);
        let samples = clip(960, 1440, 480);
        let trimmed = vad.trim_silence(&samples);
        assert_eq!(trimmed.len(), 1440);
        assert!(trimmed.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn silence_has_no_speech() {
        let vad = VadDetector::new(0.01);
        let samples = vec![0.001_f32; 4800];
        assert!(!vad.contains_speech(&samples));
        assert!(vad.trim_silence(&samples).is_empty());
        assert!(vad.trim_silence(&[]).is_empty());
    }

    #[test]
    fn short_tail_frame_is_kept() {
        let vad = VadDetector::new(0.01);
        let samples = vec![0.3_f32; 500];
        assert_eq!(vad.trim_silence(&samples).len(), 500);
    }

    #[test]
    fn threshold_separates_noise_from_speech() {
        let noisy = vec![0.02_f32; 960];
        assert!(VadDetector::new(0.01).contains_speech(&noisy));
        assert!(!VadDetector::new(0.05).contains_speech(&noisy));
    }
}
