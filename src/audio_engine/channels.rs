use std::sync::Arc;

use crate::audio_engine::errors::SampleError;
use crate::messages::SampleBuffer;

/// Maps audio samples from one channel configuration to another.
///
/// Currently supports:
/// - Mono (1 channel) → N channels: duplicates the mono signal to every channel
/// - N channels → Mono (1 channel): averages each frame
/// - Same channel count: no conversion needed
///
/// # Parameters
///
/// - `samples`: Interleaved audio samples to convert
/// - `file_channels`: Number of channels in the source audio
/// - `output_channels`: Number of channels for the output
pub fn map_channels(
    samples: Vec<f32>,
    file_channels: usize,
    output_channels: usize,
) -> Result<Vec<f32>, SampleError> {
    if file_channels == output_channels {
        return Ok(samples);
    }

    match (file_channels, output_channels) {
        (1, n) if n > 1 => {
            let mut out = Vec::with_capacity(samples.len() * n);
            for s in samples {
                out.extend(std::iter::repeat_n(s, n));
            }
            Ok(out)
        }
        (n, 1) if n > 1 => {
            let scale = 1.0 / n as f32;
            Ok(samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() * scale)
                .collect())
        }
        _ => Err(SampleError::UnsupportedChannels {
            file_channels,
            output_channels,
        }),
    }
}

/// Validates interleaved PCM handed over by the caller and lays it out for the output device.
pub fn sample_buffer_from_interleaved(
    samples: Vec<f32>,
    channels: usize,
    output_channels: usize,
) -> Result<SampleBuffer, SampleError> {
    if channels == 0 {
        return Err(SampleError::NoChannels);
    }
    if samples.is_empty() {
        return Err(SampleError::Empty);
    }
    if samples.len() % channels != 0 {
        return Err(SampleError::RaggedFrames {
            len: samples.len(),
            channels,
        });
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(SampleError::NonFinite);
    }

    let samples = map_channels(samples, channels, output_channels)?;
    Ok(SampleBuffer {
        channels: output_channels,
        samples: Arc::from(samples.into_boxed_slice()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_channels_mono_to_stereo() {
        let input = vec![0.5, -0.3, 0.8];
        let output = map_channels(input, 1, 2).unwrap();

        assert_eq!(output.len(), 6); // 3 frames × 2 channels
        assert_eq!(output, vec![0.5, 0.5, -0.3, -0.3, 0.8, 0.8]);
    }

    #[test]
    fn test_map_channels_stereo_to_mono() {
        let input = vec![0.5, 0.3, -0.2, 0.4, 0.8, 0.6];
        let output = map_channels(input, 2, 1).unwrap();

        assert_eq!(output.len(), 3);
        assert!((output[0] - 0.4).abs() < 1e-6);
        assert!((output[1] - 0.1).abs() < 1e-6);
        assert!((output[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_map_channels_mono_to_quad() {
        let output = map_channels(vec![0.25], 1, 4).unwrap();

        assert_eq!(output, vec![0.25; 4]);
    }

    #[test]
    fn test_map_channels_unsupported() {
        let result = map_channels(vec![0.5, -0.3, 0.8, 0.2], 2, 4);

        assert!(matches!(
            result,
            Err(SampleError::UnsupportedChannels { .. })
        ));
    }

    #[test]
    fn test_sample_buffer_from_interleaved() {
        let buffer = sample_buffer_from_interleaved(vec![0.1, 0.2, 0.3], 1, 2).unwrap();

        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.frames(), 3);
    }

    #[test]
    fn test_sample_buffer_rejects_bad_input() {
        assert_eq!(
            sample_buffer_from_interleaved(vec![0.1], 0, 2).unwrap_err(),
            SampleError::NoChannels
        );
        assert_eq!(
            sample_buffer_from_interleaved(Vec::new(), 2, 2).unwrap_err(),
            SampleError::Empty
        );
        assert_eq!(
            sample_buffer_from_interleaved(vec![0.1, 0.2, 0.3], 2, 2).unwrap_err(),
            SampleError::RaggedFrames { len: 3, channels: 2 }
        );
        assert_eq!(
            sample_buffer_from_interleaved(vec![0.1, f32::NAN], 2, 2).unwrap_err(),
            SampleError::NonFinite
        );
    }
}
