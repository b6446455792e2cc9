//! Poll signal: a user-raised event carrying an integer result.

use super::{PollState, PollType, Pollable, PollerSlot, Sealed};
use crate::arch::Port;
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy)]
struct SignalState {
    signaled: bool,
    result: i32,
}

/// Flag plus result value that a poll call can wait on.
///
/// Raising stores the result and marks the signal; it stays signaled until
/// [`reset`](PollSignal::reset). Raising twice keeps only the last result.
pub struct PollSignal {
    state: spin::Mutex<SignalState>,
    poller: PollerSlot,
}

impl PollSignal {
    pub const fn new() -> Self {
        Self {
            state: spin::Mutex::new(SignalState {
                signaled: false,
                result: 0,
            }),
            poller: PollerSlot::new(),
        }
    }

    /// Mark the signal with `result` and wake its poller, if one is waiting.
    /// Safe to call from interrupt context.
    pub fn raise<P: Port>(&self, kernel: &Kernel<P>, result: i32) {
        let mut guard = kernel.lock();
        *self.state.lock() = SignalState {
            signaled: true,
            result,
        };
        if self.poller.notify(&mut guard, PollState::Signaled) {
            kernel.swap(guard);
        }
    }

    /// Current `(signaled, result)` pair.
    pub fn check<P: Port>(&self, kernel: &Kernel<P>) -> (bool, i32) {
        let _guard = kernel.lock();
        let state = *self.state.lock();
        (state.signaled, state.result)
    }

    /// Clear the signaled flag. The last result is kept.
    pub fn reset<P: Port>(&self, kernel: &Kernel<P>) {
        let _guard = kernel.lock();
        self.state.lock().signaled = false;
    }
}

impl Default for PollSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Sealed for PollSignal {}

impl Pollable for PollSignal {
    fn poll_type(&self) -> PollType {
        PollType::Signal
    }

    fn condition_met(&self) -> bool {
        self.state.lock().signaled
    }

    fn poller_slot(&self) -> &PollerSlot {
        &self.poller
    }
}
