//! Real-time audio mixer implementation.
//!
//! This module provides the [`RtMixer`] struct which handles real-time mixing
//! of one-shot pad voices. Voices carry an absolute output frame to start on, so
//! starts committed ahead of time by the sequencer land on the exact frame no
//! matter which callback picks them up.
//!
//! The mixer counts every frame it renders; that count is the engine's audio clock.

use crate::audio_engine::constants::{MAX_VOICES, NUM_SAMPLES, VOLUME_MAX, VOLUME_MIN};
use crate::audio_engine::voice_slot::VoiceSlot;
use crate::messages::{PlayRequest, SampleBuffer};
use cpal::Sample;

/// Real-time mixer that handles sample slots and voice management.
///
/// All operations are allocation-free and real-time safe.
pub struct RtMixer {
    /// Number of output channels (1 for mono, 2 for stereo).
    channels: usize,

    /// Global volume multiplier.
    volume: f32,

    /// Frames rendered since the stream started.
    frames_rendered: u64,

    /// Sample storage with NUM_SAMPLES slots (bank × pad).
    sample_bank: [Option<SampleBuffer>; NUM_SAMPLES],

    /// Active voices with MAX_VOICES slots.
    voices: [VoiceSlot; MAX_VOICES],
}

impl RtMixer {
    /// Creates a new RtMixer with the specified number of channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            volume: VOLUME_MAX,
            frames_rendered: 0,
            sample_bank: std::array::from_fn(|_| None),
            voices: std::array::from_fn(|_| VoiceSlot::new()),
        }
    }

    /// Loads a sample into the sample bank at the specified slot.
    ///
    /// The sample must have the same number of channels as the mixer.
    /// Invalid IDs are silently ignored.
    pub fn load_sample(&mut self, id: usize, sample: SampleBuffer) {
        if id >= NUM_SAMPLES {
            return;
        }

        if sample.channels != self.channels {
            return;
        }

        self.sample_bank[id] = Some(sample);
    }

    /// Starts (or schedules) playback of a loaded sample.
    ///
    /// Returns `false` when the request was dropped: invalid slot or volume,
    /// nothing loaded, offset past the end of the sample, or no free voice.
    pub fn play_sample(&mut self, request: PlayRequest) -> bool {
        if request.id >= NUM_SAMPLES {
            return false;
        }

        if !request.volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&request.volume) {
            return false;
        }

        let Some(sample) = self.sample_bank[request.id].as_ref() else {
            return false;
        };
        if request.offset_frames >= sample.frames() {
            return false;
        }
        let sample = sample.clone();

        let now_frame = self.frames_rendered;
        for voice_slot in &mut self.voices {
            if !voice_slot.active {
                voice_slot.start(sample, &request, now_frame);
                return true;
            }
        }

        // No free voice slot: drop deterministically.
        false
    }

    /// Stops all voices, including those still waiting for their start frame.
    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            voice.stop();
        }
    }

    /// Sets the global volume multiplier.
    ///
    /// Invalid values (NaN, infinite, or out of range) are silently ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
            return;
        }

        self.volume = volume;
    }

    /// Stops all voices playing a specific sample.
    pub fn stop_sample(&mut self, id: usize) {
        if id >= NUM_SAMPLES {
            return;
        }

        for voice_slot in &mut self.voices {
            if voice_slot.is_playing_sample(id) {
                voice_slot.stop();
            }
        }
    }

    /// Unloads a sample from the sample bank.
    ///
    /// This stops all voices playing the sample and removes it from the bank.
    pub fn unload_sample(&mut self, id: usize) {
        if id >= NUM_SAMPLES {
            return;
        }

        self.stop_sample(id);
        self.sample_bank[id] = None;
    }

    /// Renders audio frames to the output buffer.
    ///
    /// Mixes all voices whose start frame falls inside (or before) this block
    /// into the interleaved output buffer, then advances the frame counter.
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(Sample::EQUILIBRIUM);

        if self.channels == 0 {
            return;
        }

        let frames = output.len() / self.channels;
        if frames == 0 {
            return;
        }

        let block_start = self.frames_rendered;
        let block_end = block_start + frames as u64;
        let channels = self.channels;
        let master = self.volume;

        for voice in &mut self.voices {
            if !voice.active || voice.is_pending_at(block_end - 1) {
                continue;
            }

            let Some(sample) = voice.sample.clone() else {
                voice.stop();
                continue;
            };
            let sample_frames = sample.frames();

            // Late starts play from the top of the block.
            let first = voice.start_frame.saturating_sub(block_start) as usize;
            for frame in first..frames {
                if voice.is_exhausted(sample_frames) {
                    break;
                }

                let src = voice.frame_pos * channels;
                let dst = frame * channels;
                for channel in 0..channels {
                    output[dst + channel] += sample.samples[src + channel] * voice.volume * master;
                }

                voice.frame_pos += 1;
                if let Some(remaining) = voice.frames_remaining.as_mut() {
                    *remaining -= 1;
                }
            }

            if voice.is_exhausted(sample_frames) {
                voice.stop();
            }
        }

        self.frames_rendered = block_end;
    }

    /// Frames rendered since the mixer was created.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Gets the number of channels configured for this mixer.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of voices that are playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }
}
