//! Recorded pad events, grouped per bar.

use crate::sequencer::bank::BankId;
use crate::sequencer::constants::{BAR_COUNT, DEFAULT_BPM};
use crate::sequencer::errors::SequencerError;
use crate::sequencer::tempo::bar_duration;

/// A recorded pad hit.
///
/// `time` is relative to the start of the containing bar, never absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub pad_id: usize,
    pub bank_id: BankId,
    /// Playback time in seconds from the start of the bar.
    pub time: f64,
    /// Time as played, before quantization.
    pub original_time: f64,
    pub quantized: bool,
    pub overdubbed: bool,
}

impl Event {
    /// Creates an unquantized event whose playback time equals its played time.
    pub fn new(pad_id: usize, bank_id: BankId, time: f64) -> Self {
        Self {
            pad_id,
            bank_id,
            time,
            original_time: time,
            quantized: false,
            overdubbed: false,
        }
    }

    fn validate(&self, bar_len: f64) -> Result<(), SequencerError> {
        for time in [self.time, self.original_time] {
            if check_time(time)? >= bar_len {
                return Err(SequencerError::TimeOutsideBar { time, bar: bar_len });
            }
        }
        Ok(())
    }
}

/// Rejects times that must never reach the scheduler.
pub(crate) fn check_time(time: f64) -> Result<f64, SequencerError> {
    if !time.is_finite() {
        return Err(SequencerError::NonFiniteTime(time));
    }
    if time < 0.0 {
        return Err(SequencerError::NegativeTime(time));
    }
    Ok(time)
}

/// Largest time strictly inside a bar of length `bar_len`.
fn last_instant_before(bar_len: f64) -> f64 {
    if bar_len > 0.0 && bar_len.is_finite() {
        f64::from_bits(bar_len.to_bits() - 1)
    } else {
        0.0
    }
}

/// Events of one bar. Order is not significant for playback.
pub type Bar = Vec<Event>;

/// Owns the sequence: exactly [`BAR_COUNT`] bars of events.
///
/// Every stored time lies in `[0, bar_len)` for the tempo the store was last
/// rescaled to.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    bars: [Bar; BAR_COUNT],
    bar_len: f64,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::with_bpm(DEFAULT_BPM)
    }

    /// Empty store whose bars last one bar at `bpm`.
    pub fn with_bpm(bpm: u32) -> Self {
        Self {
            bars: std::array::from_fn(|_| Vec::new()),
            bar_len: bar_duration(bpm),
        }
    }

    /// Length of one bar in seconds at the store's tempo.
    pub fn bar_len(&self) -> f64 {
        self.bar_len
    }

    /// Appends `event` to `bar`.
    ///
    /// Malformed events and times outside the bar are rejected. A bar index
    /// outside the sequence is ignored.
    pub fn record_event(&mut self, bar: usize, event: Event) -> Result<(), SequencerError> {
        event.validate(self.bar_len)?;

        let Some(events) = self.bars.get_mut(bar) else {
            return Ok(());
        };
        events.push(event);
        Ok(())
    }

    /// Empties every bar.
    pub fn clear(&mut self) {
        for bar in &mut self.bars {
            bar.clear();
        }
    }

    pub fn has_recorded_content(&self) -> bool {
        self.bars.iter().any(|bar| !bar.is_empty())
    }

    /// Rewrites every event time for a tempo transition from `old_bpm` to `new_bpm`.
    ///
    /// Must be applied exactly once per transition. Times that the scaling
    /// rounds up to the new bar length are pulled back inside the bar.
    pub fn rescale(&mut self, old_bpm: u32, new_bpm: u32) -> Result<(), SequencerError> {
        if old_bpm == 0 {
            return Err(SequencerError::InvalidBpm(old_bpm));
        }
        if new_bpm == 0 {
            return Err(SequencerError::InvalidBpm(new_bpm));
        }
        if old_bpm == new_bpm {
            return Ok(());
        }

        self.bar_len = bar_duration(new_bpm);
        let latest = last_instant_before(self.bar_len);
        let ratio = old_bpm as f64 / new_bpm as f64;
        for event in self.bars.iter_mut().flatten() {
            event.time = (event.time * ratio).min(latest);
            event.original_time = (event.original_time * ratio).min(latest);
        }
        Ok(())
    }

    pub fn bar(&self, index: usize) -> Option<&[Event]> {
        self.bars.get(index).map(Vec::as_slice)
    }

    pub fn bars(&self) -> &[Bar; BAR_COUNT] {
        &self.bars
    }

    pub fn event_count(&self) -> usize {
        self.bars.iter().map(Vec::len).sum()
    }
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new()
    }
}
