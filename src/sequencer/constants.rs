//! Musical and scheduling constants for the sequencer core.

use std::time::Duration;

/// Number of bars in a sequence. A sequence never grows or shrinks.
pub const BAR_COUNT: usize = 4;

/// Beats in one bar (4/4 time).
pub const BEATS_PER_BAR: usize = 4;

/// Quantization resolution: grid steps per beat (sixteenth notes).
pub const GRID_STEPS_PER_BEAT: u32 = 4;

/// Number of pads per bank (4 x 4 grid).
pub const NUM_PADS: usize = 16;

/// Slowest allowed tempo.
pub const MIN_BPM: u32 = 60;

/// Fastest allowed tempo.
pub const MAX_BPM: u32 = 200;

/// Tempo used when nothing else is configured.
pub const DEFAULT_BPM: u32 = 120;

/// Wall-clock interval between two scheduler ticks.
pub const LOOKAHEAD: Duration = Duration::from_millis(25);

/// Horizon in seconds: events are committed this far ahead of the audio clock.
pub const SCHEDULE_AHEAD_TIME: f64 = 0.120;

/// Lead added to the audio clock when playback starts, so bar 0 starts in the future.
pub const START_LEAD: f64 = 0.050;

/// Events closer than this to "now" are not handed to the audio layer.
pub const MIN_LEAD: f64 = 0.010;

/// Lifetime of a dedup entry, in audio-clock seconds.
pub const DEDUP_TTL: f64 = 1.0;

/// Start times are compared at millisecond resolution for dedup.
pub const DEDUP_RESOLUTION: f64 = 1_000.0;
