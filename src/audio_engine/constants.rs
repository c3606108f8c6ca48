//! Audio engine configuration constants and limits.

use crate::sequencer::BankId;

/// Number of sample banks available.
pub const NUM_BANKS: usize = BankId::COUNT;

/// Pads per bank.
pub const NUM_PADS: usize = crate::sequencer::constants::NUM_PADS;

/// Total number of sample slots (pads × banks).
pub const NUM_SAMPLES: usize = NUM_PADS * NUM_BANKS;

/// Maximum number of voices that can be active simultaneously.
pub const MAX_VOICES: usize = 32;

/// Minimum volume level (silence).
pub const VOLUME_MIN: f32 = 0.0;

/// Maximum volume level (100%).
pub const VOLUME_MAX: f32 = 1.0;

/// Volume of voices started by the sequencer.
pub const SEQUENCED_VOLUME: f32 = 1.0;

/// Capacity of each ring buffer between Python and the audio thread.
pub const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// Frames per audio callback requested from the device.
pub const BUFFER_FRAMES: u32 = 512;
