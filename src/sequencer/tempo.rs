//! Tempo bookkeeping and the durations derived from it.

use crate::sequencer::constants::{BAR_COUNT, BEATS_PER_BAR, MAX_BPM, MIN_BPM};
use crate::sequencer::errors::SequencerError;
use crate::sequencer::store::SequenceStore;

/// Duration of one beat in seconds.
pub fn beat_duration(bpm: u32) -> f64 {
    60.0 / bpm.max(1) as f64
}

/// Duration of one bar in seconds.
pub fn bar_duration(bpm: u32) -> f64 {
    beat_duration(bpm) * BEATS_PER_BAR as f64
}

/// Duration of the whole looped sequence in seconds.
pub fn loop_duration(bpm: u32) -> f64 {
    bar_duration(bpm) * BAR_COUNT as f64
}

/// Duration of one grid step in seconds.
pub fn step_duration(bpm: u32, grid_steps_per_beat: u32) -> f64 {
    beat_duration(bpm) / grid_steps_per_beat.max(1) as f64
}

/// Clamps a requested tempo into `[MIN_BPM, MAX_BPM]`.
///
/// Returns the clamped value and whether clamping was needed.
pub fn clamp_bpm(requested: i64) -> (u32, bool) {
    let clamped = requested.clamp(MIN_BPM as i64, MAX_BPM as i64);
    (clamped as u32, clamped != requested)
}

/// Outcome of a tempo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub old_bpm: u32,
    pub new_bpm: u32,
    /// The requested tempo was outside the valid range.
    pub clamped: bool,
}

impl TempoChange {
    pub fn changed(&self) -> bool {
        self.old_bpm != self.new_bpm
    }
}

/// Owns the process-wide tempo and keeps recorded events in musical shape
/// when it changes.
#[derive(Debug, Clone)]
pub struct TempoManager {
    bpm: u32,
}

impl TempoManager {
    pub fn new(bpm: u32) -> Self {
        let (bpm, _) = clamp_bpm(bpm as i64);
        Self { bpm }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Moves the tempo by `delta` BPM.
    pub fn change_tempo(
        &mut self,
        delta: i32,
        store: &mut SequenceStore,
    ) -> Result<TempoChange, SequencerError> {
        self.apply(self.bpm as i64 + delta as i64, store)
    }

    /// Sets the tempo to `value` BPM.
    pub fn set_bpm(
        &mut self,
        value: i32,
        store: &mut SequenceStore,
    ) -> Result<TempoChange, SequencerError> {
        self.apply(value as i64, store)
    }

    fn apply(
        &mut self,
        requested: i64,
        store: &mut SequenceStore,
    ) -> Result<TempoChange, SequencerError> {
        let (new_bpm, clamped) = clamp_bpm(requested);
        if clamped {
            log::info!("Tempo {requested} BPM out of range, clamped to {new_bpm} BPM");
        }

        let change = TempoChange {
            old_bpm: self.bpm,
            new_bpm,
            clamped,
        };

        if change.changed() {
            store.rescale(change.old_bpm, change.new_bpm)?;
            self.bpm = new_bpm;
        }

        Ok(change)
    }
}

impl Default for TempoManager {
    fn default() -> Self {
        Self::new(crate::sequencer::constants::DEFAULT_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::bank::BankId;
    use crate::sequencer::store::Event;

    #[test]
    fn test_durations_at_120_bpm() {
        assert_eq!(beat_duration(120), 0.5);
        assert_eq!(bar_duration(120), 2.0);
        assert_eq!(loop_duration(120), 8.0);
        assert_eq!(step_duration(120, 4), 0.125);
    }

    #[test]
    fn test_clamp_bpm() {
        assert_eq!(clamp_bpm(30), (MIN_BPM, true));
        assert_eq!(clamp_bpm(500), (MAX_BPM, true));
        assert_eq!(clamp_bpm(-4), (MIN_BPM, true));
        assert_eq!(clamp_bpm(128), (128, false));
    }

    #[test]
    fn test_new_clamps_initial_tempo() {
        assert_eq!(TempoManager::new(20).bpm(), MIN_BPM);
        assert_eq!(TempoManager::default().bpm(), 120);
    }

    #[test]
    fn test_change_tempo_by_delta() {
        let mut store = SequenceStore::new();
        let mut tempo = TempoManager::new(120);

        let change = tempo.change_tempo(5, &mut store).unwrap();
        assert_eq!(change.old_bpm, 120);
        assert_eq!(change.new_bpm, 125);
        assert!(!change.clamped);

        let change = tempo.change_tempo(-200, &mut store).unwrap();
        assert_eq!(change.new_bpm, MIN_BPM);
        assert!(change.clamped);
        assert_eq!(tempo.bpm(), MIN_BPM);
    }

    #[test]
    fn test_set_bpm_rescales_recorded_events() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(1, BankId::A, 1.0)).unwrap();
        let mut tempo = TempoManager::new(120);

        tempo.set_bpm(60, &mut store).unwrap();

        assert_eq!(tempo.bpm(), 60);
        assert!((store.bar(0).unwrap()[0].time - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unchanged_tempo_does_not_rescale() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(1, BankId::A, 1.0)).unwrap();
        let mut tempo = TempoManager::new(MAX_BPM);

        let change = tempo.change_tempo(10, &mut store).unwrap();

        assert!(change.clamped);
        assert!(!change.changed());
        assert_eq!(store.bar(0).unwrap()[0].time, 1.0);
    }

    #[test]
    fn test_each_transition_rescales_once() {
        let mut store = SequenceStore::new();
        store.record_event(3, Event::new(2, BankId::B, 0.5)).unwrap();
        let mut tempo = TempoManager::new(100);

        tempo.set_bpm(200, &mut store).unwrap();
        tempo.set_bpm(200, &mut store).unwrap();

        assert!((store.bar(3).unwrap()[0].time - 0.25).abs() < 1e-12);
    }
}
