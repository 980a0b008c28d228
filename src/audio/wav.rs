//! In-memory WAV encoding for upload to a transcription API.

use std::io::Cursor;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("WAV encoding failed: {0}")]
pub struct WavError(#[from] hound::Error);

/// Encode mono `f32` samples as a 16-bit PCM WAV file.
///
/// Samples outside `[-1.0, 1.0]` are clamped.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(pcm)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
