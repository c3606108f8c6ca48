use std::time::Duration;

use crate::sequencer::constants::{
    DEDUP_TTL, DEFAULT_BPM, GRID_STEPS_PER_BEAT, LOOKAHEAD, MIN_LEAD, SCHEDULE_AHEAD_TIME,
    START_LEAD,
};

/// Runtime configuration of a [`Sequencer`](crate::sequencer::Sequencer).
///
/// The defaults are the values the engine ships with; tests and embedders
/// override individual fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    /// Tempo at construction. Clamped into the valid BPM range.
    pub initial_bpm: u32,

    /// Wall-clock interval between scheduler ticks.
    pub lookahead: Duration,

    /// Horizon in seconds ahead of the audio clock.
    pub schedule_ahead: f64,

    /// Lead added to "now" when playback starts.
    pub start_lead: f64,

    /// Minimum distance between "now" and a dispatched start time.
    pub min_lead: f64,

    /// Lifetime of a dedup entry in audio-clock seconds.
    pub dedup_ttl: f64,

    /// Grid resolution used for both quantization and the scheduler walk.
    pub grid_steps_per_beat: u32,

    /// Initial quantize strength (0 = free timing, 1 = full snap).
    pub quantize_strength: f64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            initial_bpm: DEFAULT_BPM,
            lookahead: LOOKAHEAD,
            schedule_ahead: SCHEDULE_AHEAD_TIME,
            start_lead: START_LEAD,
            min_lead: MIN_LEAD,
            dedup_ttl: DEDUP_TTL,
            grid_steps_per_beat: GRID_STEPS_PER_BEAT,
            quantize_strength: 0.0,
        }
    }
}
