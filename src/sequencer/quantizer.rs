use crate::sequencer::constants::BEATS_PER_BAR;
use crate::sequencer::tempo::step_duration;

/// Snaps a bar-relative `time` towards the nearest grid step.
///
/// `strength` blends between the played time (0) and the grid time (1) and is
/// clamped into that range. The result is wrapped into `[0, bar)`, so a hit
/// just before the end of the bar can land on the downbeat of the same bar.
pub fn quantize(time: f64, bpm: u32, grid_steps_per_beat: u32, strength: f64) -> f64 {
    let step = step_duration(bpm, grid_steps_per_beat);
    let bar = step * (grid_steps_per_beat.max(1) as usize * BEATS_PER_BAR) as f64;

    let strength = if strength.is_finite() {
        strength.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let grid_time = (time / step).round() * step;
    let blended = grid_time * strength + time * (1.0 - strength);

    wrap_into_bar(blended, bar)
}

fn wrap_into_bar(time: f64, bar: f64) -> f64 {
    let wrapped = time.rem_euclid(bar);
    // rem_euclid may round up to `bar` for tiny negative inputs.
    if wrapped >= bar { 0.0 } else { wrapped }
}
