use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug)]
struct TickerState {
    running: bool,
    paused: bool,
}

type SharedState = Arc<(Mutex<TickerState>, Condvar)>;

/// Background thread that calls a closure on a fixed interval until stopped.
///
/// A paused ticker parks its thread until it is resumed or stopped.
pub struct Ticker {
    state: SharedState,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<T>(interval: Duration, mut on_tick: T) -> io::Result<Self>
    where
        T: FnMut() + Send + 'static,
    {
        let state: SharedState = Arc::new((
            Mutex::new(TickerState {
                running: true,
                paused: false,
            }),
            Condvar::new(),
        ));
        let thread_state = Arc::clone(&state);

        let handle = thread::Builder::new()
            .name("sequencer-ticker".to_string())
            .spawn(move || {
                while wait_until_due(&thread_state) {
                    on_tick();
                    thread::sleep(interval);
                }
            })?;

        Ok(Self {
            state,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Parks the thread after the tick in flight.
    pub fn pause(&self) {
        self.update(|state| state.paused = true);
    }

    pub fn resume(&self) {
        self.update(|state| state.paused = false);
    }

    pub fn is_paused(&self) -> bool {
        match self.state.0.lock() {
            Ok(state) => state.paused,
            Err(_) => false,
        }
    }

    /// Stops the thread and waits for the tick in flight to finish.
    pub fn stop(&mut self) {
        self.update(|state| state.running = false);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Sequencer ticker thread panicked");
        }
    }

    fn update(&self, f: impl FnOnce(&mut TickerState)) {
        let (lock, wake) = &*self.state;
        match lock.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
        wake.notify_all();
    }
}

/// Blocks while paused. Returns `false` once the ticker is stopped.
fn wait_until_due(state: &SharedState) -> bool {
    let (lock, wake) = &**state;
    let Ok(guard) = lock.lock() else {
        return false;
    };
    match wake.wait_while(guard, |state| state.running && state.paused) {
        Ok(state) => state.running,
        Err(_) => false,
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
