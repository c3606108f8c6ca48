//! Sequencer error types.

use thiserror::Error;

use crate::sequencer::bank::BankId;

/// Errors raised when input to the sequencer is malformed.
///
/// These are reported at `record_event`/`rescale` time so that the tick loop
/// only ever sees well-formed events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    /// An event time was NaN or infinite.
    #[error("event time must be finite, got {0}")]
    NonFiniteTime(f64),

    /// An event time was negative.
    #[error("event time must not be negative, got {0}")]
    NegativeTime(f64),

    /// An event time does not fall inside its bar.
    #[error("event time {time} is outside the bar (expected 0..{bar})")]
    TimeOutsideBar {
        /// Offending time.
        time: f64,
        /// Bar length in seconds.
        bar: f64,
    },

    /// The pad index is outside the pad grid.
    #[error("pad out of range (expected 0..{max}, got {pad})")]
    PadOutOfRange {
        /// Requested pad.
        pad: usize,
        /// Number of pads per bank.
        max: usize,
    },

    /// A tempo of zero cannot be used to rescale event times.
    #[error("bpm must be positive, got {0}")]
    InvalidBpm(u32),

    /// A bank name did not match A, B, C or D.
    #[error("unknown bank {0:?} (expected A, B, C or D)")]
    UnknownBank(String),
}

/// Errors reported by an audio source factory when a pad cannot be started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    /// Nothing is loaded on this pad in this bank.
    #[error("no sample assigned to pad {pad} in bank {bank}")]
    MissingSample {
        /// Pad that was triggered.
        pad: usize,
        /// Bank the pad was triggered in.
        bank: BankId,
    },

    /// The pad index is outside the pad grid.
    #[error("pad {0} out of range")]
    PadOutOfRange(usize),

    /// The start time cannot be mapped onto the audio clock.
    #[error("start time {0} is not a valid audio clock time")]
    InvalidStartTime(f64),

    /// The control queue to the audio thread is full.
    #[error("control queue full, dropped start for pad {pad}")]
    QueueFull {
        /// Pad whose start was dropped.
        pad: usize,
    },

    /// The audio engine is not running.
    #[error("audio engine not running")]
    EngineStopped,
}
