//! Deterministic pad sequencer.
//!
//! [`Sequencer`] records pad hits into a four-bar loop and plays them back
//! through a look-ahead scheduler. It talks to the outside world only
//! through the traits in [`collaborators`], so the whole core runs against a
//! manual clock in tests and against the audio engine in production.

pub mod bank;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod errors;
pub mod quantizer;
pub mod scheduler;
pub mod store;
pub mod tempo;
pub mod ticker;

#[cfg(test)]
mod test_support;

pub use bank::BankId;
pub use collaborators::{AudioClock, AudioSourceFactory, BankSelector};
pub use config::SequencerConfig;
pub use dispatcher::{DispatchOutcome, TriggerDispatcher};
pub use errors::{SequencerError, TriggerError};
pub use quantizer::quantize;
pub use scheduler::{CursorSnapshot, SchedulerCore, SchedulerState, TickReport};
pub use store::{Event, SequenceStore};
pub use tempo::{TempoChange, TempoManager};
pub use ticker::Ticker;

use crate::sequencer::constants::{BAR_COUNT, NUM_PADS};
use crate::sequencer::store::check_time;
use crate::sequencer::tempo::{bar_duration, loop_duration};

/// What incoming pad hits do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// Hits are played but not recorded.
    #[default]
    Idle,
    /// Recording into a freshly cleared sequence.
    Recording,
    /// Recording on top of the existing sequence.
    Overdub,
}

impl RecordMode {
    pub fn is_armed(&self) -> bool {
        !matches!(self, RecordMode::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordMode::Idle => "idle",
            RecordMode::Recording => "recording",
            RecordMode::Overdub => "overdub",
        }
    }
}

/// An event as it was stored, with the bar it went into.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub bar: usize,
    pub event: Event,
}

/// Owns the sequence, the tempo and the scheduler, plus the collaborators
/// they run against.
pub struct Sequencer<C, F, B> {
    clock: C,
    banks: B,
    store: SequenceStore,
    tempo: TempoManager,
    scheduler: SchedulerCore<F>,
    mode: RecordMode,
    quantize_strength: f64,
    config: SequencerConfig,
}

impl<C, F, B> Sequencer<C, F, B>
where
    C: AudioClock,
    F: AudioSourceFactory,
    B: BankSelector,
{
    pub fn new(clock: C, factory: F, banks: B) -> Self {
        Self::with_config(clock, factory, banks, SequencerConfig::default())
    }

    pub fn with_config(clock: C, factory: F, banks: B, config: SequencerConfig) -> Self {
        let tempo = TempoManager::new(config.initial_bpm);
        Self {
            clock,
            banks,
            store: SequenceStore::with_bpm(tempo.bpm()),
            tempo,
            scheduler: SchedulerCore::new(factory, &config),
            mode: RecordMode::Idle,
            quantize_strength: clamp_strength(config.quantize_strength).unwrap_or(0.0),
            config,
        }
    }

    /// Records a hit played `raw_elapsed` seconds after the sequence started.
    ///
    /// The time is wrapped into the loop and split into a bar and a
    /// bar-relative time, then quantized with the current strength. Returns
    /// `Ok(None)` when nothing is armed.
    pub fn record_event(
        &mut self,
        pad: usize,
        bank: BankId,
        raw_elapsed: f64,
    ) -> Result<Option<RecordedEvent>, SequencerError> {
        if !self.mode.is_armed() {
            return Ok(None);
        }
        if pad >= NUM_PADS {
            return Err(SequencerError::PadOutOfRange {
                pad,
                max: NUM_PADS,
            });
        }
        let raw_elapsed = check_time(raw_elapsed)?;

        let bpm = self.tempo.bpm();
        let bar_len = bar_duration(bpm);
        let within_loop = raw_elapsed.rem_euclid(loop_duration(bpm));
        let bar = ((within_loop / bar_len).floor() as usize).min(BAR_COUNT - 1);
        let original_time = (within_loop - bar as f64 * bar_len).max(0.0);
        let original_time = if original_time >= bar_len { 0.0 } else { original_time };

        let quantized = self.quantize_strength > 0.0;
        let time = if quantized {
            quantize(
                original_time,
                bpm,
                self.config.grid_steps_per_beat,
                self.quantize_strength,
            )
        } else {
            original_time
        };

        let event = Event {
            pad_id: pad,
            bank_id: bank,
            time,
            original_time,
            quantized,
            overdubbed: self.mode == RecordMode::Overdub,
        };
        self.store.record_event(bar, event.clone())?;
        log::debug!(
            "Recorded pad {pad} (bank {bank}) in bar {bar} at {time:.3}s ({})",
            self.mode.as_str()
        );

        Ok(Some(RecordedEvent { bar, event }))
    }

    /// Records a hit happening right now on the audio clock.
    ///
    /// Hits during the start lead count as the first downbeat. The caller has
    /// already played the hit, so its copy in the current pass is not started
    /// again. Returns `Ok(None)` when nothing is armed or the sequence is not
    /// playing.
    pub fn record_hit(
        &mut self,
        pad: usize,
        bank: BankId,
    ) -> Result<Option<RecordedEvent>, SequencerError> {
        let Some(start) = self.scheduler.sequence_start_time() else {
            return Ok(None);
        };
        let now = self.clock.now();
        let elapsed = (now - start).max(0.0);
        let recorded = self.record_event(pad, bank, elapsed)?;

        if let Some(recorded) = &recorded {
            self.scheduler.mark_played(recorded, elapsed, now, self.tempo.bpm());
        }
        Ok(recorded)
    }

    /// Starts playback. Returns `false` if it was already playing.
    pub fn start_sequence(&mut self) -> bool {
        let started = self.scheduler.start(self.clock.now());
        if started {
            log::info!("Sequence started at {} BPM", self.tempo.bpm());
        }
        started
    }

    /// Stops playback and disarms recording. Returns `false` if it was
    /// already stopped.
    pub fn stop_sequence(&mut self) -> bool {
        self.mode = RecordMode::Idle;
        let stopped = self.scheduler.stop();
        if stopped {
            log::info!("Sequence stopped");
        }
        stopped
    }

    /// Clears the sequence, arms recording and starts playback if needed.
    pub fn start_recording(&mut self) {
        self.store.clear();
        self.mode = RecordMode::Recording;
        log::info!("Recording armed");
        self.start_sequence();
    }

    /// Arms recording on top of the current sequence and starts playback if
    /// needed.
    pub fn start_overdub(&mut self) {
        self.mode = RecordMode::Overdub;
        log::info!("Overdub armed");
        self.start_sequence();
    }

    /// Disarms recording. Playback continues.
    pub fn stop_recording(&mut self) {
        if self.mode.is_armed() {
            log::info!("Recording stopped, {} events", self.store.event_count());
        }
        self.mode = RecordMode::Idle;
    }

    pub fn clear_sequence(&mut self) {
        self.store.clear();
        log::info!("Sequence cleared");
    }

    /// Moves the tempo by `delta` BPM.
    pub fn change_tempo(&mut self, delta: i32) -> Result<TempoChange, SequencerError> {
        let change = self.tempo.change_tempo(delta, &mut self.store)?;
        self.after_tempo_change(change);
        Ok(change)
    }

    /// Sets the tempo to `value` BPM.
    pub fn set_bpm(&mut self, value: i32) -> Result<TempoChange, SequencerError> {
        let change = self.tempo.set_bpm(value, &mut self.store)?;
        self.after_tempo_change(change);
        Ok(change)
    }

    fn after_tempo_change(&mut self, change: TempoChange) {
        if !change.changed() {
            return;
        }
        log::info!("Tempo {} -> {} BPM", change.old_bpm, change.new_bpm);

        // The cursor was laid out for the old tempo.
        if self.scheduler.is_running() {
            self.scheduler.restart(self.clock.now());
            log::debug!("Scheduler restarted after tempo change");
        }
    }

    /// Sets the quantize strength, clamped into `[0, 1]`.
    ///
    /// NaN leaves the strength unchanged. Returns the strength now in effect.
    pub fn set_quantize_strength(&mut self, value: f64) -> f64 {
        if let Some(strength) = clamp_strength(value) {
            self.quantize_strength = strength;
        }
        self.quantize_strength
    }

    pub fn quantize_strength(&self) -> f64 {
        self.quantize_strength
    }

    /// Runs one scheduler pass against the current audio-clock time.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let report = self
            .scheduler
            .tick(now, self.tempo.bpm(), &self.store, &mut self.banks);
        if report.failed > 0 {
            log::debug!("Tick at {now:.3}s: {} starts failed", report.failed);
        }
        report
    }

    pub fn cursor(&self) -> CursorSnapshot {
        self.scheduler.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn recording_mode(&self) -> RecordMode {
        self.mode
    }

    pub fn bpm(&self) -> u32 {
        self.tempo.bpm()
    }

    pub fn store(&self) -> &SequenceStore {
        &self.store
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn banks(&self) -> &B {
        &self.banks
    }

    pub fn banks_mut(&mut self) -> &mut B {
        &mut self.banks
    }

    pub fn factory(&self) -> &F {
        self.scheduler.dispatcher().factory()
    }

    pub fn factory_mut(&mut self) -> &mut F {
        self.scheduler.dispatcher_mut().factory_mut()
    }

    pub fn scheduler(&self) -> &SchedulerCore<F> {
        &self.scheduler
    }
}

fn clamp_strength(value: f64) -> Option<f64> {
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 1.0))
}
