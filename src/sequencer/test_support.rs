//! Collaborator doubles shared by the sequencer tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::sequencer::bank::BankId;
use crate::sequencer::collaborators::{AudioClock, AudioSourceFactory, BankSelector};
use crate::sequencer::errors::TriggerError;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn at(now: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Debug, Default)]
struct BankState {
    active: BankId,
    history: Vec<BankId>,
}

/// Bank selector that remembers every switch. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedBanks {
    state: Rc<RefCell<BankState>>,
}

impl SharedBanks {
    pub fn new(active: BankId) -> Self {
        Self {
            state: Rc::new(RefCell::new(BankState {
                active,
                history: Vec::new(),
            })),
        }
    }

    pub fn history(&self) -> Vec<BankId> {
        self.state.borrow().history.clone()
    }
}

impl BankSelector for SharedBanks {
    fn active_bank(&self) -> BankId {
        self.state.borrow().active
    }

    fn set_active_bank(&mut self, bank: BankId) {
        let mut state = self.state.borrow_mut();
        state.active = bank;
        state.history.push(bank);
    }
}

/// One `start_pad` call as seen by [`RecordingFactory`].
#[derive(Debug, Clone, PartialEq)]
pub struct StartCall {
    pub pad: usize,
    pub bank: BankId,
    pub when: f64,
    /// Active bank at the moment of the call, when a selector is watched.
    pub active_bank: Option<BankId>,
}

/// Factory that records successful starts and fails for pads marked missing.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    calls: Vec<StartCall>,
    missing: HashSet<(usize, BankId)>,
    banks: Option<SharedBanks>,
}

impl RecordingFactory {
    pub fn watching(banks: &SharedBanks) -> Self {
        Self {
            banks: Some(banks.clone()),
            ..Self::default()
        }
    }

    pub fn mark_missing(&mut self, pad: usize, bank: BankId) {
        self.missing.insert((pad, bank));
    }

    pub fn calls(&self) -> &[StartCall] {
        &self.calls
    }

    pub fn start_times(&self) -> Vec<f64> {
        self.calls.iter().map(|call| call.when).collect()
    }
}

impl AudioSourceFactory for RecordingFactory {
    fn start_pad(
        &mut self,
        pad: usize,
        bank: BankId,
        when: f64,
        _offset: Option<f64>,
        _duration: Option<f64>,
    ) -> Result<(), TriggerError> {
        if self.missing.contains(&(pad, bank)) {
            return Err(TriggerError::MissingSample { pad, bank });
        }
        self.calls.push(StartCall {
            pad,
            bank,
            when,
            active_bank: self.banks.as_ref().map(|banks| banks.active_bank()),
        });
        Ok(())
    }
}
