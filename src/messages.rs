//! Message definitions for communication between Python and Rust audio threads.
//!
//! This module defines the enums that serve as the wire format for messages passed through the
//! ring buffer between the control side (Python calls and the sequencer ticker) and the
//! real-time audio thread.

use pyo3::prelude::*;
use std::sync::Arc;

/// Immutable interleaved PCM in the output channel layout.
#[derive(Debug, Clone)]
pub(crate) struct SampleBuffer {
    pub channels: usize,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }
}

/// Message that is emitted from the audio thread.
#[derive(Debug, Clone)]
#[pyclass]
pub enum AudioMessage {
    /// Response to a Ping message.
    Pong(),

    /// A start request was dropped (no free voice, or nothing loaded in the slot).
    VoiceDropped { id: usize },
}

#[pymethods]
impl AudioMessage {
    pub fn voice_dropped(&self) -> Option<usize> {
        match self {
            AudioMessage::VoiceDropped { id } => Some(*id),
            _ => None,
        }
    }
}

/// A request to start one voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayRequest {
    /// Sample slot to play.
    pub id: usize,

    /// Playback volume (0.0 to 1.0).
    pub volume: f32,

    /// Output frame on which the voice starts. `None` starts on the next rendered frame,
    /// and so does a frame that has already been rendered.
    pub start_frame: Option<u64>,

    /// Frames skipped at the start of the sample.
    pub offset_frames: usize,

    /// Maximum number of frames to play. `None` plays to the end of the sample.
    pub duration_frames: Option<usize>,
}

impl PlayRequest {
    /// Plays the whole sample as soon as possible.
    pub fn immediate(id: usize, volume: f32) -> Self {
        Self {
            id,
            volume,
            start_frame: None,
            offset_frames: 0,
            duration_frames: None,
        }
    }
}

/// Message that is emitted from the control side.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// Used for testing message passing functionality.
    Ping(),

    /// Set the global volume level.
    ///
    /// # Parameters
    /// * `volume` - Volume level (0.0 to 1.0)
    SetVolume(f32),

    /// Publish a loaded sample into an audio-thread slot.
    ///
    /// # Parameters
    /// * `id` - Sample slot (bank × pad)
    /// * `sample` - Immutable sample buffer (shared handle)
    LoadSample { id: usize, sample: SampleBuffer },

    /// Play a loaded sample, immediately or on an exact output frame.
    PlaySample(PlayRequest),

    /// Stop all active voices for a sample.
    ///
    /// # Parameters
    /// * `id` - Identifier of the sample to stop
    StopSample { id: usize },

    /// Stop all currently active voices.
    StopAll(),

    /// Unload a sample slot.
    ///
    /// This stops all active voices for the sample and clears the sample buffer in the slot.
    ///
    /// # Parameters
    /// * `id` - Identifier of the sample slot to unload
    UnloadSample { id: usize },
}
