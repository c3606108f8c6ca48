//! Interfaces the sequencer core needs from the outside world.
//!
//! The audio engine implements these on top of its output stream; tests
//! implement them with a manual clock and recording doubles.

use crate::sequencer::bank::BankId;
use crate::sequencer::errors::TriggerError;

/// Monotonic time source in seconds.
///
/// Must share its time domain with the `when` argument of
/// [`AudioSourceFactory::start_pad`].
pub trait AudioClock {
    fn now(&self) -> f64;
}

/// Starts pad samples at an absolute audio-clock time.
pub trait AudioSourceFactory {
    /// Start the sample on `pad` in `bank` at `when`.
    ///
    /// `offset` skips into the sample and `duration` cuts it short, both in
    /// seconds. Fails with [`TriggerError::MissingSample`] when nothing is
    /// loaded for the pad/bank pair.
    fn start_pad(
        &mut self,
        pad: usize,
        bank: BankId,
        when: f64,
        offset: Option<f64>,
        duration: Option<f64>,
    ) -> Result<(), TriggerError>;
}

/// Reads and switches the bank the pad grid currently addresses.
pub trait BankSelector {
    fn active_bank(&self) -> BankId;
    fn set_active_bank(&mut self, bank: BankId);
}
