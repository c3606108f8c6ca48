//! At-most-once, bank-aware triggering of scheduled events.

use std::collections::HashMap;

use crate::sequencer::bank::BankId;
use crate::sequencer::collaborators::{AudioSourceFactory, BankSelector};
use crate::sequencer::constants::DEDUP_RESOLUTION;
use crate::sequencer::errors::TriggerError;
use crate::sequencer::store::Event;

/// Identity of one physical trigger: pad, bank and start time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub pad_id: usize,
    pub bank_id: BankId,
    pub when_ms: i64,
}

impl DedupKey {
    pub fn new(pad_id: usize, bank_id: BankId, when: f64) -> Self {
        Self {
            pad_id,
            bank_id,
            when_ms: (when * DEDUP_RESOLUTION).round() as i64,
        }
    }
}

/// Set of recently dispatched keys. Each entry lives for `ttl` seconds of
/// audio-clock time and is evicted lazily.
#[derive(Debug, Clone)]
pub struct DedupSet {
    expiries: HashMap<DedupKey, f64>,
    ttl: f64,
}

impl DedupSet {
    pub fn new(ttl: f64) -> Self {
        Self {
            expiries: HashMap::new(),
            ttl,
        }
    }

    /// Inserts `key` at time `now`. Returns `false` if a live entry already exists.
    pub fn insert(&mut self, key: DedupKey, now: f64) -> bool {
        self.evict_expired(now);
        if self.expiries.contains_key(&key) {
            return false;
        }
        self.expiries.insert(key, now + self.ttl);
        true
    }

    fn evict_expired(&mut self, now: f64) {
        self.expiries.retain(|_, expires_at| *expires_at > now);
    }

    pub fn clear(&mut self) {
        self.expiries.clear();
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

/// Result of handing one event to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The start request reached the audio source factory.
    Started,
    /// Already dispatched inside the dedup window; nothing happened.
    Duplicate,
    /// The factory refused the start. Already logged.
    Failed(TriggerError),
}

/// Switches the active bank for as long as it lives and restores the previous
/// bank when dropped.
struct BankScope<'a, B: BankSelector> {
    banks: &'a mut B,
    previous: Option<BankId>,
}

impl<'a, B: BankSelector> BankScope<'a, B> {
    fn enter(banks: &'a mut B, bank: BankId) -> Self {
        let active = banks.active_bank();
        let previous = if active != bank {
            banks.set_active_bank(bank);
            Some(active)
        } else {
            None
        };
        Self { banks, previous }
    }
}

impl<B: BankSelector> Drop for BankScope<'_, B> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.banks.set_active_bank(previous);
        }
    }
}

/// Executes scheduled events against an [`AudioSourceFactory`].
pub struct TriggerDispatcher<F> {
    factory: F,
    dedup: DedupSet,
}

impl<F: AudioSourceFactory> TriggerDispatcher<F> {
    pub fn new(factory: F, dedup_ttl: f64) -> Self {
        Self {
            factory,
            dedup: DedupSet::new(dedup_ttl),
        }
    }

    /// Starts `event` at absolute time `when`, at most once per dedup window.
    ///
    /// A factory failure is logged and reported but never propagated, so the
    /// caller can carry on with the rest of its window.
    pub fn dispatch<B: BankSelector>(
        &mut self,
        event: &Event,
        when: f64,
        now: f64,
        banks: &mut B,
    ) -> DispatchOutcome {
        let key = DedupKey::new(event.pad_id, event.bank_id, when);
        if !self.dedup.insert(key, now) {
            return DispatchOutcome::Duplicate;
        }

        let result = {
            let _scope = BankScope::enter(banks, event.bank_id);
            self.factory
                .start_pad(event.pad_id, event.bank_id, when, None, None)
        };

        match result {
            Ok(()) => DispatchOutcome::Started,
            Err(err) => {
                log::warn!(
                    "Skipping pad {} (bank {}) at {when:.3}s: {err}",
                    event.pad_id,
                    event.bank_id
                );
                DispatchOutcome::Failed(err)
            }
        }
    }

    /// Treats `event` at `when` as already started, so the next dispatch of
    /// it inside the dedup window is a duplicate.
    pub fn mark_dispatched(&mut self, event: &Event, when: f64, now: f64) -> bool {
        self.dedup
            .insert(DedupKey::new(event.pad_id, event.bank_id, when), now)
    }

    /// Forgets every dispatched key.
    pub fn clear(&mut self) {
        self.dedup.clear();
    }

    /// Number of keys currently held by the dedup window.
    pub fn pending_keys(&self) -> usize {
        self.dedup.len()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}
