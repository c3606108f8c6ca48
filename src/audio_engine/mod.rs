//! Audio Engine Module
//!
//! This module provides real-time pad playback and the sequencer runtime.
//! It is organized into sub-modules, each with a specific responsibility:
//!
//! - [`audio_stream`]: CPAL audio stream management and real-time callback
//! - [`channels`]: Validation and channel layout of incoming PCM
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Audio-specific error types
//! - [`mixer`]: Real-time mixing engine with frame-accurate voice starts
//! - [`scheduling`]: Audio clock, trigger and bank state for the sequencer
//!
//! The main [`AudioEngine`] struct orchestrates these components and drives a
//! [`Sequencer`] from a ticker thread.

use crate::audio_engine::audio_stream::{AudioStreamHandle, create_audio_stream, start_stream};
use crate::audio_engine::channels::sample_buffer_from_interleaved;
use crate::audio_engine::constants::{VOLUME_MAX, VOLUME_MIN};
use crate::audio_engine::scheduling::{
    EngineTrigger, FrameClock, SharedBank, SlotRegistry, sample_slot,
};
use crate::messages::{AudioMessage, ControlMessage, PlayRequest};
use crate::sequencer::{BankId, BankSelector, Sequencer, Ticker};
use numpy::PyReadonlyArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::{Arc, Mutex};

mod audio_stream;
mod channels;
mod constants;
mod errors;
mod mixer;
mod scheduling;
mod voice_slot;

type EngineSequencer = Sequencer<FrameClock, EngineTrigger, SharedBank>;

/// Everything that only exists while the output stream is open.
struct EngineRuntime {
    // Declared first so the ticker is joined before the stream closes.
    ticker: Ticker,
    sequencer: Arc<Mutex<EngineSequencer>>,
    stream_handle: AudioStreamHandle,
}

fn parse_bank(bank: &str) -> PyResult<BankId> {
    Ok(bank.parse::<BankId>()?)
}

fn pad_slot(bank: BankId, pad: usize) -> PyResult<usize> {
    sample_slot(bank, pad).ok_or_else(|| {
        PyValueError::new_err(format!(
            "pad out of range (expected 0..{}, got {pad})",
            constants::NUM_PADS
        ))
    })
}

/// AudioEngine plays pads and runs the step sequencer on top of a cpal output stream.
#[pyclass]
pub struct AudioEngine {
    runtime: Option<EngineRuntime>,
    banks: SharedBank,
    slots: SlotRegistry,
}

impl AudioEngine {
    fn runtime(&self) -> PyResult<&EngineRuntime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("Audio engine not initialized"))
    }

    fn push(&self, message: ControlMessage, what: &str) -> PyResult<()> {
        let runtime = self.runtime()?;
        let mut producer_guard = runtime
            .stream_handle
            .producer
            .lock()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire producer lock"))?;

        producer_guard.push(message).map_err(|_| {
            PyRuntimeError::new_err(format!("Failed to send {what} - buffer may be full"))
        })
    }

    fn with_sequencer<R>(&self, f: impl FnOnce(&mut EngineSequencer) -> R) -> PyResult<R> {
        let runtime = self.runtime()?;
        let mut sequencer = runtime
            .sequencer
            .lock()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire sequencer lock"))?;
        Ok(f(&mut sequencer))
    }

    /// Like `with_sequencer`, then parks or wakes the ticker to match the
    /// transport.
    fn with_transport<R>(&self, f: impl FnOnce(&mut EngineSequencer) -> R) -> PyResult<R> {
        let runtime = self.runtime()?;
        let mut sequencer = runtime
            .sequencer
            .lock()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire sequencer lock"))?;
        let result = f(&mut sequencer);

        if sequencer.is_running() {
            runtime.ticker.resume();
        } else {
            runtime.ticker.pause();
        }
        Ok(result)
    }

    fn bank_or_active(&self, bank: Option<&str>) -> PyResult<BankId> {
        match bank {
            Some(bank) => parse_bank(bank),
            None => Ok(self.banks.active_bank()),
        }
    }
}

#[pymethods]
impl AudioEngine {
    /// Create a new AudioEngine instance with default audio device.
    #[new]
    pub fn new() -> PyResult<Self> {
        Ok(AudioEngine {
            runtime: None,
            banks: SharedBank::new(BankId::default()),
            slots: SlotRegistry::new(),
        })
    }

    /// Initialize and run the audio engine and the sequencer ticker.
    pub fn run(&mut self) -> PyResult<()> {
        if self.runtime.is_some() {
            return Err(PyRuntimeError::new_err("AudioEngine already running"));
        }

        let stream_handle = create_audio_stream().map_err(|e| {
            PyRuntimeError::new_err(format!("Failed to create audio stream: {e}"))
        })?;
        start_stream(&stream_handle.stream)
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to start audio stream: {e}")))?;

        let clock = FrameClock::new(
            Arc::clone(&stream_handle.frames_rendered),
            stream_handle.output_sample_rate,
        );
        let trigger = EngineTrigger::new(
            Arc::clone(&stream_handle.producer),
            clock.clone(),
            self.slots.clone(),
        );
        let sequencer = Arc::new(Mutex::new(Sequencer::new(
            clock,
            trigger,
            self.banks.clone(),
        )));

        let lookahead = sequencer
            .lock()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire sequencer lock"))?
            .config()
            .lookahead;
        let ticking = Arc::clone(&sequencer);
        let ticker = Ticker::spawn(lookahead, move || match ticking.lock() {
            Ok(mut sequencer) => {
                sequencer.tick();
            }
            Err(_) => log::error!("Sequencer lock poisoned, skipping tick"),
        })
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to start sequencer ticker: {e}")))?;
        // Nothing to schedule until the sequence starts.
        ticker.pause();

        self.runtime = Some(EngineRuntime {
            ticker,
            sequencer,
            stream_handle,
        });
        Ok(())
    }

    /// Shut down the sequencer ticker and the audio engine.
    pub fn shut_down(&mut self) -> PyResult<()> {
        if let Some(mut runtime) = self.runtime.take() {
            runtime.ticker.stop();
            log::info!("AudioEngine shut down");
        }
        Ok(())
    }

    /// Publish decoded PCM into the slot of `pad` in `bank`.
    ///
    /// `frames` holds interleaved float32 samples with `channels` channels at the
    /// output sample rate.
    pub fn load_sample(
        &mut self,
        bank: &str,
        pad: usize,
        frames: PyReadonlyArray1<'_, f32>,
        channels: usize,
    ) -> PyResult<()> {
        let bank = parse_bank(bank)?;
        let id = pad_slot(bank, pad)?;
        let output_channels = self.runtime()?.stream_handle.output_channels;

        let samples: Vec<f32> = frames.as_array().iter().copied().collect();
        let sample = sample_buffer_from_interleaved(samples, channels, output_channels)?;
        let frame_count = sample.frames();

        self.push(ControlMessage::LoadSample { id, sample }, "LoadSample")?;
        self.slots.set_loaded(id, true);
        log::info!("Loaded {frame_count} frames into pad {pad} (bank {bank})");
        Ok(())
    }

    /// Unload the sample of `pad` in `bank`.
    pub fn unload_sample(&mut self, bank: &str, pad: usize) -> PyResult<()> {
        let bank = parse_bank(bank)?;
        let id = pad_slot(bank, pad)?;

        self.push(ControlMessage::UnloadSample { id }, "UnloadSample")?;
        self.slots.set_loaded(id, false);
        Ok(())
    }

    /// Play a pad now and record the hit if recording is armed.
    ///
    /// Plays from the active bank unless `bank` is given. Returns `False` when
    /// the pad has no sample.
    #[pyo3(signature = (pad, volume, bank=None))]
    pub fn trigger_pad(&mut self, pad: usize, volume: f32, bank: Option<&str>) -> PyResult<bool> {
        if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
            return Err(PyValueError::new_err("volume out of range"));
        }

        let bank = self.bank_or_active(bank)?;
        let id = pad_slot(bank, pad)?;
        if !self.slots.is_loaded(id) {
            log::debug!("Pad {pad} (bank {bank}) has no sample");
            return Ok(false);
        }

        self.push(
            ControlMessage::PlaySample(PlayRequest::immediate(id, volume)),
            "PlaySample",
        )?;
        self.with_sequencer(|sequencer| sequencer.record_hit(pad, bank))??;
        Ok(true)
    }

    /// Stop playback of a pad in `bank` (the active bank by default).
    #[pyo3(signature = (pad, bank=None))]
    pub fn stop_pad(&mut self, pad: usize, bank: Option<&str>) -> PyResult<()> {
        let bank = self.bank_or_active(bank)?;
        let id = pad_slot(bank, pad)?;
        self.push(ControlMessage::StopSample { id }, "StopSample")
    }

    /// Stop playback of all active voices.
    pub fn stop_all(&mut self) -> PyResult<()> {
        self.push(ControlMessage::StopAll(), "Stop")
    }

    /// Set the global volume multiplier.
    pub fn set_volume(&mut self, volume: f32) -> PyResult<()> {
        if !volume.is_finite() || !(VOLUME_MIN..=VOLUME_MAX).contains(&volume) {
            return Err(PyValueError::new_err("volume out of range"));
        }

        self.push(ControlMessage::SetVolume(volume), "SetVolume")
    }

    /// Send a ping message to the audio thread.
    pub fn ping(&mut self) -> PyResult<()> {
        self.push(ControlMessage::Ping(), "Ping")
    }

    /// Receive a message from the audio thread.
    pub fn receive_msg(&mut self) -> PyResult<Option<AudioMessage>> {
        let runtime = self.runtime()?;
        let mut consumer_guard = runtime
            .stream_handle
            .consumer
            .lock()
            .map_err(|_| PyRuntimeError::new_err("Failed to acquire consumer lock"))?;

        match consumer_guard.pop() {
            Ok(msg) => Ok(Some(msg)),
            Err(_) => Ok(None),
        }
    }

    /// Start sequence playback. Returns `False` if it was already playing.
    pub fn start_sequence(&mut self) -> PyResult<bool> {
        self.with_transport(|sequencer| sequencer.start_sequence())
    }

    /// Stop sequence playback. Returns `False` if it was already stopped.
    pub fn stop_sequence(&mut self) -> PyResult<bool> {
        self.with_transport(|sequencer| sequencer.stop_sequence())
    }

    /// Clear the sequence and record into it, starting playback if needed.
    pub fn start_recording(&mut self) -> PyResult<()> {
        self.with_transport(|sequencer| sequencer.start_recording())
    }

    /// Record on top of the current sequence, starting playback if needed.
    pub fn start_overdub(&mut self) -> PyResult<()> {
        self.with_transport(|sequencer| sequencer.start_overdub())
    }

    pub fn stop_recording(&mut self) -> PyResult<()> {
        self.with_sequencer(|sequencer| sequencer.stop_recording())
    }

    pub fn clear_sequence(&mut self) -> PyResult<()> {
        self.with_sequencer(|sequencer| sequencer.clear_sequence())
    }

    /// Current recording mode: "idle", "recording" or "overdub".
    pub fn recording_mode(&self) -> PyResult<&'static str> {
        self.with_sequencer(|sequencer| sequencer.recording_mode().as_str())
    }

    /// Move the tempo by `delta` BPM. Returns the tempo now in effect.
    pub fn change_tempo(&mut self, delta: i32) -> PyResult<u32> {
        let change = self.with_sequencer(|sequencer| sequencer.change_tempo(delta))??;
        Ok(change.new_bpm)
    }

    /// Set the tempo. Out-of-range values are clamped. Returns the tempo now in effect.
    pub fn set_bpm(&mut self, bpm: i32) -> PyResult<u32> {
        let change = self.with_sequencer(|sequencer| sequencer.set_bpm(bpm))??;
        Ok(change.new_bpm)
    }

    pub fn bpm(&self) -> PyResult<u32> {
        self.with_sequencer(|sequencer| sequencer.bpm())
    }

    /// Set the quantize strength (0.0 to 1.0). Returns the strength now in effect.
    pub fn set_quantize_strength(&mut self, strength: f64) -> PyResult<f64> {
        self.with_sequencer(|sequencer| sequencer.set_quantize_strength(strength))
    }

    /// Current `(bar, beat)` of the playing sequence; beats count from 1.
    pub fn cursor(&self) -> PyResult<(usize, usize)> {
        self.with_sequencer(|sequencer| {
            let cursor = sequencer.cursor();
            (cursor.current_bar, cursor.current_beat)
        })
    }

    pub fn is_sequence_running(&self) -> PyResult<bool> {
        self.with_sequencer(|sequencer| sequencer.is_running())
    }

    pub fn has_recorded_content(&self) -> PyResult<bool> {
        self.with_sequencer(|sequencer| sequencer.store().has_recorded_content())
    }

    /// Switch the bank the pad grid addresses.
    pub fn set_active_bank(&mut self, bank: &str) -> PyResult<()> {
        let bank = parse_bank(bank)?;
        if self.runtime.is_some() {
            // The dispatcher swaps banks while holding the sequencer lock.
            self.with_sequencer(|sequencer| sequencer.banks_mut().set_active_bank(bank))?;
        } else {
            self.banks.set_active_bank(bank);
        }
        Ok(())
    }

    pub fn active_bank(&self) -> String {
        self.banks.active_bank().to_string()
    }
}
