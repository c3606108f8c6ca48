//! Audio-specific error types.

use pyo3::PyErr;
use pyo3::exceptions::PyValueError;
use thiserror::Error;

use crate::sequencer::SequencerError;

/// Errors raised while turning PCM handed over from Python into a sample buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// No frames at all.
    #[error("sample has no frames")]
    Empty,

    /// A channel count of zero was given.
    #[error("sample must have at least one channel")]
    NoChannels,

    /// The interleaved buffer does not split into whole frames.
    #[error("{len} samples do not split into frames of {channels} channels")]
    RaggedFrames {
        /// Number of interleaved samples.
        len: usize,
        /// Declared channel count.
        channels: usize,
    },

    /// Unsupported channel mapping configuration.
    #[error(
        "unsupported channel mapping: sample has {file_channels} channels, output has {output_channels} channels (only mono and same-width samples supported)"
    )]
    UnsupportedChannels {
        /// Number of channels in the sample.
        file_channels: usize,
        /// Number of channels expected for output.
        output_channels: usize,
    },

    /// The buffer contains NaN or infinite samples.
    #[error("sample contains non-finite values")]
    NonFinite,
}

impl From<SampleError> for PyErr {
    fn from(err: SampleError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

impl From<SequencerError> for PyErr {
    fn from(err: SequencerError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}
