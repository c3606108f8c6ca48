//! Engine-side implementations of the sequencer collaborators.
//!
//! [`FrameClock`] reads the frame counter published by the output callback,
//! [`EngineTrigger`] turns an absolute start time into a frame-stamped
//! `PlaySample` message and [`SharedBank`] holds the bank the pad grid
//! addresses. All of them are cheap to clone and `Send`, so the sequencer can
//! live behind a mutex shared with the ticker thread.

use rtrb::Producer;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio_engine::constants::{NUM_PADS, NUM_SAMPLES, SEQUENCED_VOLUME};
use crate::messages::{ControlMessage, PlayRequest};
use crate::sequencer::{AudioClock, AudioSourceFactory, BankId, BankSelector, TriggerError};

/// Sample slot of `pad` in `bank`, or `None` for a pad outside the grid.
pub fn sample_slot(bank: BankId, pad: usize) -> Option<usize> {
    if pad >= NUM_PADS {
        return None;
    }
    Some(bank.index() * NUM_PADS + pad)
}

/// Audio clock driven by the number of frames the output stream has rendered.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    /// Output frame that sounds at audio-clock time `seconds`.
    pub fn frame_at(&self, seconds: f64) -> Option<u64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        Some((seconds * self.sample_rate as f64).round() as u64)
    }

    /// Length of `seconds` in frames.
    pub fn frames_in(&self, seconds: f64) -> Option<usize> {
        self.frame_at(seconds).map(|frames| frames as usize)
    }
}

impl AudioClock for FrameClock {
    fn now(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

/// Which sample slots hold a sample, as seen from the control side.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    loaded: Arc<[AtomicBool]>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self {
            loaded: (0..NUM_SAMPLES).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn set_loaded(&self, slot: usize, loaded: bool) {
        if let Some(flag) = self.loaded.get(slot) {
            flag.store(loaded, Ordering::Release);
        }
    }

    pub fn is_loaded(&self, slot: usize) -> bool {
        self.loaded
            .get(slot)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Active bank shared between the Python thread and the sequencer.
#[derive(Debug, Clone, Default)]
pub struct SharedBank {
    active: Arc<AtomicU8>,
}

impl SharedBank {
    pub fn new(bank: BankId) -> Self {
        Self {
            active: Arc::new(AtomicU8::new(bank.index() as u8)),
        }
    }
}

impl BankSelector for SharedBank {
    fn active_bank(&self) -> BankId {
        BankId::from_index(self.active.load(Ordering::Acquire) as usize).unwrap_or_default()
    }

    fn set_active_bank(&mut self, bank: BankId) {
        self.active.store(bank.index() as u8, Ordering::Release);
    }
}

/// Starts pad samples by pushing frame-stamped play requests to the audio thread.
pub struct EngineTrigger {
    producer: Arc<Mutex<Producer<ControlMessage>>>,
    clock: FrameClock,
    slots: SlotRegistry,
}

impl EngineTrigger {
    pub fn new(
        producer: Arc<Mutex<Producer<ControlMessage>>>,
        clock: FrameClock,
        slots: SlotRegistry,
    ) -> Self {
        Self {
            producer,
            clock,
            slots,
        }
    }
}

impl AudioSourceFactory for EngineTrigger {
    fn start_pad(
        &mut self,
        pad: usize,
        bank: BankId,
        when: f64,
        offset: Option<f64>,
        duration: Option<f64>,
    ) -> Result<(), TriggerError> {
        let id = sample_slot(bank, pad).ok_or(TriggerError::PadOutOfRange(pad))?;
        if !self.slots.is_loaded(id) {
            return Err(TriggerError::MissingSample { pad, bank });
        }

        let start_frame = self
            .clock
            .frame_at(when)
            .ok_or(TriggerError::InvalidStartTime(when))?;
        let offset_frames = offset
            .and_then(|seconds| self.clock.frames_in(seconds))
            .unwrap_or(0);
        let duration_frames = duration.and_then(|seconds| self.clock.frames_in(seconds));

        let request = PlayRequest {
            id,
            volume: SEQUENCED_VOLUME,
            start_frame: Some(start_frame),
            offset_frames,
            duration_frames,
        };

        let mut producer = self
            .producer
            .lock()
            .map_err(|_| TriggerError::EngineStopped)?;
        producer
            .push(ControlMessage::PlaySample(request))
            .map_err(|_| TriggerError::QueueFull { pad })?;

        log::trace!("Pad {pad} (bank {bank}) scheduled at frame {start_frame}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrb::{Consumer, RingBuffer};

    fn trigger(capacity: usize) -> (EngineTrigger, Consumer<ControlMessage>, SlotRegistry) {
        let (producer, consumer) = RingBuffer::new(capacity);
        let clock = FrameClock::new(Arc::new(AtomicU64::new(0)), 48_000);
        let slots = SlotRegistry::new();
        let trigger = EngineTrigger::new(Arc::new(Mutex::new(producer)), clock, slots.clone());
        (trigger, consumer, slots)
    }

    #[test]
    fn test_sample_slot_layout() {
        assert_eq!(sample_slot(BankId::A, 0), Some(0));
        assert_eq!(sample_slot(BankId::B, 3), Some(NUM_PADS + 3));
        assert_eq!(sample_slot(BankId::D, NUM_PADS - 1), Some(NUM_SAMPLES - 1));
        assert_eq!(sample_slot(BankId::A, NUM_PADS), None);
    }

    #[test]
    fn test_frame_clock() {
        let frames = Arc::new(AtomicU64::new(0));
        let clock = FrameClock::new(Arc::clone(&frames), 48_000);

        frames.store(24_000, Ordering::Release);

        assert_eq!(clock.now(), 0.5);
        assert_eq!(clock.frame_at(10.5), Some(504_000));
        assert_eq!(clock.frame_at(-1.0), None);
        assert_eq!(clock.frame_at(f64::INFINITY), None);
    }

    #[test]
    fn test_shared_bank_clones_share_state() {
        let mut banks = SharedBank::new(BankId::A);
        let view = banks.clone();

        banks.set_active_bank(BankId::C);

        assert_eq!(view.active_bank(), BankId::C);
    }

    #[test]
    fn test_start_pad_pushes_frame_stamped_request() {
        let (mut trigger, mut consumer, slots) = trigger(4);
        slots.set_loaded(NUM_PADS + 2, true);

        trigger.start_pad(2, BankId::B, 1.0, None, Some(0.5)).unwrap();

        let Ok(ControlMessage::PlaySample(request)) = consumer.pop() else {
            panic!("expected a PlaySample message");
        };
        assert_eq!(request.id, NUM_PADS + 2);
        assert_eq!(request.start_frame, Some(48_000));
        assert_eq!(request.offset_frames, 0);
        assert_eq!(request.duration_frames, Some(24_000));
    }

    #[test]
    fn test_start_pad_without_sample_fails() {
        let (mut trigger, mut consumer, _) = trigger(4);

        let result = trigger.start_pad(1, BankId::A, 1.0, None, None);

        assert_eq!(
            result,
            Err(TriggerError::MissingSample {
                pad: 1,
                bank: BankId::A
            })
        );
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_start_pad_reports_full_queue() {
        let (mut trigger, _consumer, slots) = trigger(1);
        slots.set_loaded(0, true);

        trigger.start_pad(0, BankId::A, 1.0, None, None).unwrap();
        let result = trigger.start_pad(0, BankId::A, 1.1, None, None);

        assert_eq!(result, Err(TriggerError::QueueFull { pad: 0 }));
    }

    #[test]
    fn test_start_pad_rejects_bad_input() {
        let (mut trigger, _consumer, slots) = trigger(4);
        slots.set_loaded(0, true);

        assert_eq!(
            trigger.start_pad(NUM_PADS, BankId::A, 1.0, None, None),
            Err(TriggerError::PadOutOfRange(NUM_PADS))
        );
        assert!(matches!(
            trigger.start_pad(0, BankId::A, f64::NAN, None, None),
            Err(TriggerError::InvalidStartTime(_))
        ));
    }
}
