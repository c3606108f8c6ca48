//! Look-ahead scheduler.
//!
//! Each [`SchedulerCore::tick`] walks the timeline one grid step at a time up
//! to a short horizon ahead of the audio clock and hands every recorded event
//! that falls inside the horizon to the [`TriggerDispatcher`]. The audio layer
//! receives absolute start times, so a late tick only delays when a start is
//! committed, never when it sounds.
//!
//! Bar and cycle positions are always derived from `sequence_start_time`
//! instead of being accumulated, so long sessions do not drift.

use crate::sequencer::collaborators::{AudioSourceFactory, BankSelector};
use crate::sequencer::config::SequencerConfig;
use crate::sequencer::constants::{BAR_COUNT, BEATS_PER_BAR};
use crate::sequencer::dispatcher::{DispatchOutcome, TriggerDispatcher};
use crate::sequencer::store::SequenceStore;
use crate::sequencer::RecordedEvent;
use crate::sequencer::tempo::{bar_duration, beat_duration, loop_duration, step_duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
}

/// Playback position of the running scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerCursor {
    /// Audio-clock time of bar 0 of the current playback pass.
    pub sequence_start_time: f64,
    /// Next grid step the walk will visit.
    pub next_note_time: f64,
    /// Bar under the audio clock (display only).
    pub current_bar: usize,
    /// 1-based beat under the audio clock (display only).
    pub current_beat: usize,
}

/// Read-only cursor view for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub current_bar: usize,
    pub current_beat: usize,
}

impl Default for CursorSnapshot {
    fn default() -> Self {
        Self {
            current_bar: 0,
            current_beat: 1,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Grid steps walked.
    pub steps: usize,
    pub started: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// A bar in a particular pass through the loop. Orders by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BarSlot {
    cycle: u64,
    bar: usize,
}

/// Durations for one tick, taken from the tempo at tick time.
#[derive(Debug, Clone, Copy)]
struct Grid {
    beat: f64,
    bar: f64,
    loop_len: f64,
    step: f64,
}

impl Grid {
    fn new(bpm: u32, grid_steps_per_beat: u32) -> Self {
        Self {
            beat: beat_duration(bpm),
            bar: bar_duration(bpm),
            loop_len: loop_duration(bpm),
            step: step_duration(bpm, grid_steps_per_beat),
        }
    }

    /// Bar slot containing `time`, or `None` before the sequence starts.
    fn locate(&self, sequence_start: f64, time: f64) -> Option<BarSlot> {
        let from_start = time - sequence_start;
        if from_start < 0.0 {
            return None;
        }

        let cycle = (from_start / self.loop_len).floor();
        let within = from_start.rem_euclid(self.loop_len);
        let bar = ((within / self.bar).floor() as usize).min(BAR_COUNT - 1);
        Some(BarSlot {
            cycle: cycle as u64,
            bar,
        })
    }

    fn next_slot(&self, slot: BarSlot) -> BarSlot {
        if slot.bar + 1 < BAR_COUNT {
            BarSlot {
                cycle: slot.cycle,
                bar: slot.bar + 1,
            }
        } else {
            BarSlot {
                cycle: slot.cycle + 1,
                bar: 0,
            }
        }
    }

    fn bar_origin(&self, sequence_start: f64, slot: BarSlot) -> f64 {
        sequence_start + slot.cycle as f64 * self.loop_len + slot.bar as f64 * self.bar
    }

    fn position(&self, sequence_start: f64, now: f64) -> CursorSnapshot {
        let elapsed = now - sequence_start;
        if elapsed < 0.0 {
            return CursorSnapshot::default();
        }

        let within_loop = elapsed.rem_euclid(self.loop_len);
        let bar = ((within_loop / self.bar).floor() as usize).min(BAR_COUNT - 1);
        let within_bar = within_loop - bar as f64 * self.bar;
        let beat = ((within_bar / self.beat).floor() as usize).min(BEATS_PER_BAR - 1);
        CursorSnapshot {
            current_bar: bar,
            current_beat: beat + 1,
        }
    }
}

/// The look-ahead state machine. Owns the cursor and the dispatcher (and with
/// it the dedup window).
pub struct SchedulerCore<F> {
    state: SchedulerState,
    cursor: Option<SchedulerCursor>,
    dispatcher: TriggerDispatcher<F>,
    schedule_ahead: f64,
    start_lead: f64,
    min_lead: f64,
    grid_steps_per_beat: u32,
}

impl<F: AudioSourceFactory> SchedulerCore<F> {
    pub fn new(factory: F, config: &SequencerConfig) -> Self {
        Self {
            state: SchedulerState::Stopped,
            cursor: None,
            dispatcher: TriggerDispatcher::new(factory, config.dedup_ttl),
            schedule_ahead: config.schedule_ahead,
            start_lead: config.start_lead,
            min_lead: config.min_lead,
            grid_steps_per_beat: config.grid_steps_per_beat,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn cursor(&self) -> Option<&SchedulerCursor> {
        self.cursor.as_ref()
    }

    /// Audio-clock origin of the current pass, while running.
    pub fn sequence_start_time(&self) -> Option<f64> {
        self.cursor.map(|cursor| cursor.sequence_start_time)
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        self.cursor
            .map(|cursor| CursorSnapshot {
                current_bar: cursor.current_bar,
                current_beat: cursor.current_beat,
            })
            .unwrap_or_default()
    }

    /// Starts a new playback pass with bar 0 slightly after `now`.
    ///
    /// Returns `false` (and does nothing) when already running.
    pub fn start(&mut self, now: f64) -> bool {
        if self.is_running() {
            return false;
        }

        let sequence_start_time = now + self.start_lead;
        self.cursor = Some(SchedulerCursor {
            sequence_start_time,
            next_note_time: sequence_start_time,
            current_bar: 0,
            current_beat: 1,
        });
        self.state = SchedulerState::Running;
        log::debug!("Scheduler started, bar 0 at {sequence_start_time:.3}s");
        true
    }

    /// Stops playback and forgets the dedup window.
    ///
    /// Starts already handed to the audio layer are not retracted. Returns
    /// `false` (and does nothing) when already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        self.state = SchedulerState::Stopped;
        self.cursor = None;
        self.dispatcher.clear();
        log::debug!("Scheduler stopped");
        true
    }

    /// Stops and immediately starts a fresh pass from `now`.
    pub fn restart(&mut self, now: f64) {
        self.stop();
        self.start(now);
    }

    /// Commits every event inside `[now + min_lead, now + schedule_ahead)`.
    pub fn tick<B: BankSelector>(
        &mut self,
        now: f64,
        bpm: u32,
        store: &SequenceStore,
        banks: &mut B,
    ) -> TickReport {
        let mut report = TickReport::default();
        if self.state != SchedulerState::Running {
            return report;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return report;
        };

        let grid = Grid::new(bpm, self.grid_steps_per_beat);
        let start = cursor.sequence_start_time;

        let position = grid.position(start, now);
        cursor.current_bar = position.current_bar;
        cursor.current_beat = position.current_beat;

        let window = Window {
            earliest: now + self.min_lead,
            horizon: now + self.schedule_ahead,
            now,
        };
        let mut visited: Vec<BarSlot> = Vec::with_capacity(2);

        while cursor.next_note_time < window.horizon {
            if let Some(slot) = grid.locate(start, cursor.next_note_time)
                && !visited.contains(&slot)
            {
                visited.push(slot);
                schedule_bar(&mut self.dispatcher, store, &grid, start, slot, window, banks, &mut report);
            }
            cursor.next_note_time += grid.step;
            report.steps += 1;
        }

        // Events between two grid steps can enter the window while the walk
        // sits in a later bar, so every bar the window overlaps is swept.
        let first = grid.locate(start, window.earliest.max(start));
        let last = grid.locate(start, window.horizon);
        if let (Some(mut slot), Some(last)) = (first, last) {
            while slot <= last {
                if !visited.contains(&slot) {
                    visited.push(slot);
                    schedule_bar(&mut self.dispatcher, store, &grid, start, slot, window, banks, &mut report);
                }
                slot = grid.next_slot(slot);
            }
        }

        report
    }

    /// Marks the playback copy of a hit recorded `elapsed` seconds into the
    /// sequence as already started, so the current pass does not sound it a
    /// second time.
    pub fn mark_played(&mut self, recorded: &RecordedEvent, elapsed: f64, now: f64, bpm: u32) {
        let Some(start) = self.sequence_start_time() else {
            return;
        };

        let grid = Grid::new(bpm, self.grid_steps_per_beat);
        let slot = BarSlot {
            cycle: (elapsed / grid.loop_len).floor().max(0.0) as u64,
            bar: recorded.bar,
        };
        let when = grid.bar_origin(start, slot) + recorded.event.time;
        self.dispatcher.mark_dispatched(&recorded.event, when, now);
    }

    pub fn dispatcher(&self) -> &TriggerDispatcher<F> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut TriggerDispatcher<F> {
        &mut self.dispatcher
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    earliest: f64,
    horizon: f64,
    now: f64,
}

impl Window {
    fn contains(&self, when: f64) -> bool {
        self.earliest <= when && when < self.horizon
    }
}

#[allow(clippy::too_many_arguments)]
fn schedule_bar<F: AudioSourceFactory, B: BankSelector>(
    dispatcher: &mut TriggerDispatcher<F>,
    store: &SequenceStore,
    grid: &Grid,
    sequence_start: f64,
    slot: BarSlot,
    window: Window,
    banks: &mut B,
    report: &mut TickReport,
) {
    let Some(events) = store.bar(slot.bar) else {
        return;
    };
    let origin = grid.bar_origin(sequence_start, slot);

    for event in events {
        let when = origin + event.time;
        // Late events are dropped, not played late.
        if !window.contains(when) {
            continue;
        }

        match dispatcher.dispatch(event, when, window.now, banks) {
            DispatchOutcome::Started => report.started += 1,
            DispatchOutcome::Duplicate => report.duplicates += 1,
            DispatchOutcome::Failed(_) => report.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::bank::BankId;
    use crate::sequencer::store::Event;
    use crate::sequencer::test_support::{RecordingFactory, SharedBanks};

    const TICK: f64 = 0.025;

    fn scheduler() -> SchedulerCore<RecordingFactory> {
        SchedulerCore::new(RecordingFactory::default(), &SequencerConfig::default())
    }

    /// Ticks every 25ms from `from` while the clock is below `until`.
    fn run(
        core: &mut SchedulerCore<RecordingFactory>,
        store: &SequenceStore,
        bpm: u32,
        from: f64,
        until: f64,
    ) {
        let mut banks = SharedBanks::new(BankId::A);
        let mut i = 0u32;
        loop {
            let now = from + i as f64 * TICK;
            if now >= until {
                break;
            }
            core.tick(now, bpm, store, &mut banks);
            i += 1;
        }
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut core = scheduler();

        assert!(!core.stop());
        assert!(core.start(1.0));
        assert!(!core.start(2.0));
        assert_eq!(core.sequence_start_time(), Some(1.0 + 0.050));
        assert!(core.stop());
        assert!(!core.stop());
        assert_eq!(core.state(), SchedulerState::Stopped);
        assert!(core.cursor().is_none());
    }

    #[test]
    fn test_start_initialises_cursor() {
        let mut core = scheduler();
        core.start(3.0);

        let cursor = core.cursor().unwrap();
        assert_eq!(cursor.next_note_time, cursor.sequence_start_time);
        assert_eq!(cursor.current_bar, 0);
        assert_eq!(cursor.current_beat, 1);
    }

    #[test]
    fn test_tick_while_stopped_does_nothing() {
        let mut core = scheduler();
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(0, BankId::A, 0.0)).unwrap();

        let report = core.tick(0.0, 120, &store, &mut SharedBanks::new(BankId::A));

        assert_eq!(report, TickReport::default());
        assert!(core.dispatcher().factory().calls().is_empty());
    }

    #[test]
    fn test_event_is_dispatched_once_per_loop() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(3, BankId::A, 0.5)).unwrap();
        let mut core = scheduler();
        core.start(9.95);

        run(&mut core, &store, 120, 9.95, 18.6);

        let times = core.dispatcher().factory().start_times();
        assert_eq!(times.len(), 2);
        assert!((times[0] - 10.5).abs() < 1e-6);
        assert!((times[1] - 18.5).abs() < 1e-6);
        let call = &core.dispatcher().factory().calls()[0];
        assert_eq!((call.pad, call.bank), (3, BankId::A));
    }

    #[test]
    fn test_horizon_coverage_over_many_loops() {
        let mut store = SequenceStore::new();
        for bar in 0..BAR_COUNT {
            store.record_event(bar, Event::new(bar, BankId::B, 0.0)).unwrap();
        }
        let loops = 5;
        let mut core = scheduler();
        core.start(0.0);
        let start = core.sequence_start_time().unwrap();

        // Stop short of the first event of the next loop entering the horizon.
        run(&mut core, &store, 120, 0.0, start + loops as f64 * 8.0 - 0.15);

        let times = core.dispatcher().factory().start_times();
        assert_eq!(times.len(), loops * BAR_COUNT);
        for (i, when) in times.iter().enumerate() {
            assert!((when - (start + i as f64 * 2.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_off_grid_events_are_not_missed() {
        let mut store = SequenceStore::new();
        let times = [0.01, 0.3, 0.61, 0.999, 1.13, 1.77, 1.95];
        for (pad, time) in times.iter().enumerate() {
            store.record_event(1, Event::new(pad, BankId::A, *time)).unwrap();
        }
        let mut core = scheduler();
        core.start(0.0);

        run(&mut core, &store, 120, 0.0, 4.0);

        let start = core.sequence_start_time().unwrap();
        let dispatched = core.dispatcher().factory().start_times();
        assert_eq!(dispatched.len(), times.len());
        for (when, time) in dispatched.iter().zip(times) {
            assert!((when - (start + 2.0 + time)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bar_end_event_survives_every_tick_phase() {
        let mut store = SequenceStore::new();
        store.record_event(1, Event::new(0, BankId::A, 1.99)).unwrap();

        // The tick grid stays fixed on the audio clock while the start moves.
        for phase in 0..50 {
            let started_at = phase as f64 * 0.0005;
            let mut core = scheduler();
            core.start(started_at);
            let start = core.sequence_start_time().unwrap();

            run(&mut core, &store, 120, TICK, start + 8.0 - 0.15);

            let times = core.dispatcher().factory().start_times();
            assert_eq!(times.len(), 1, "started at {started_at}");
            assert!((times[0] - (start + 3.99)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sweep_covers_bar_and_loop_boundaries() {
        let mut store = SequenceStore::new();
        store.record_event(3, Event::new(1, BankId::A, 1.999)).unwrap();
        store.record_event(0, Event::new(2, BankId::A, 0.0)).unwrap();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);
        // Walk the cursor up to the end of the first loop.
        run(&mut core, &store, 120, 0.0, 7.9);
        let before = core.dispatcher().factory().calls().len();

        // One window straddling the loop boundary at 8.05.
        core.tick(7.98, 120, &store, &mut banks);

        let times = core.dispatcher().factory().start_times();
        assert_eq!(times.len(), before + 2);
        for expected in [8.049, 8.05] {
            assert!(times[before..].iter().any(|when| (when - expected).abs() < 1e-6));
        }
    }

    #[test]
    fn test_late_events_are_skipped() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(5, BankId::A, 0.5)).unwrap();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);

        core.tick(0.0, 120, &store, &mut banks);
        // Clock jumps past the event before it entered the horizon.
        let report = core.tick(0.6, 120, &store, &mut banks);

        assert_eq!(report.started, 0);
        assert!(core.dispatcher().factory().calls().is_empty());

        run(&mut core, &store, 120, 0.625, 8.7);
        let times = core.dispatcher().factory().start_times();
        assert_eq!(times.len(), 1);
        assert!((times[0] - 8.55).abs() < 1e-6);
    }

    #[test]
    fn test_events_too_close_to_now_are_skipped() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(0, BankId::A, 0.0)).unwrap();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);

        // Start time 0.05 is only 5ms ahead of this tick.
        core.tick(0.045, 120, &store, &mut banks);

        assert!(core.dispatcher().factory().calls().is_empty());
    }

    #[test]
    fn test_overlapping_windows_count_duplicates() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(0, BankId::A, 0.0)).unwrap();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);

        let first = core.tick(0.0, 120, &store, &mut banks);
        let second = core.tick(0.01, 120, &store, &mut banks);

        assert_eq!(first.started, 1);
        assert_eq!(second.started, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(core.dispatcher().factory().calls().len(), 1);
    }

    #[test]
    fn test_missing_sample_does_not_stop_the_tick() {
        let mut factory = RecordingFactory::default();
        factory.mark_missing(1, BankId::A);
        let mut core = SchedulerCore::new(factory, &SequencerConfig::default());
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(1, BankId::A, 0.0)).unwrap();
        store.record_event(0, Event::new(2, BankId::A, 0.0)).unwrap();
        core.start(0.0);

        let report = core.tick(0.0, 120, &store, &mut SharedBanks::new(BankId::A));

        assert_eq!(report.failed, 1);
        assert_eq!(report.started, 1);
        assert_eq!(core.dispatcher().factory().calls()[0].pad, 2);
        assert!(core.is_running());
    }

    #[test]
    fn test_stop_clears_dedup_window() {
        let mut store = SequenceStore::new();
        store.record_event(0, Event::new(0, BankId::A, 0.0)).unwrap();
        let mut core = scheduler();
        core.start(0.0);
        core.tick(0.0, 120, &store, &mut SharedBanks::new(BankId::A));
        assert_eq!(core.dispatcher().pending_keys(), 1);

        core.stop();

        assert_eq!(core.dispatcher().pending_keys(), 0);
        assert!(store.has_recorded_content());
    }

    #[test]
    fn test_cursor_tracks_bar_and_beat() {
        let store = SequenceStore::new();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);

        core.tick(0.01, 120, &store, &mut banks);
        assert_eq!(core.snapshot(), CursorSnapshot::default());

        // 0.05 + 2.0 (bar 1) + 1.1 (beat 3)
        core.tick(3.15, 120, &store, &mut banks);
        assert_eq!(
            core.snapshot(),
            CursorSnapshot {
                current_bar: 1,
                current_beat: 3
            }
        );

        // Wraps into the next loop.
        core.tick(8.05 + 6.6, 120, &store, &mut banks);
        assert_eq!(core.snapshot().current_bar, 3);
        assert_eq!(core.snapshot().current_beat, 2);
    }

    #[test]
    fn test_next_note_time_only_moves_forward() {
        let store = SequenceStore::new();
        let mut core = scheduler();
        let mut banks = SharedBanks::new(BankId::A);
        core.start(0.0);

        let mut last = core.cursor().unwrap().next_note_time;
        for i in 0..100 {
            core.tick(i as f64 * TICK, 120, &store, &mut banks);
            let next = core.cursor().unwrap().next_note_time;
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn test_restart_moves_origin() {
        let mut core = scheduler();
        core.start(0.0);

        core.restart(5.0);

        assert!(core.is_running());
        assert!((core.sequence_start_time().unwrap() - 5.05).abs() < 1e-12);
    }
}
