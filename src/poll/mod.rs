//! Poll: wait on several kernel objects at once.
//!
//! A poll call scans its events, and if none is ready registers itself as
//! the single poller of every watched object and blocks. A producer that
//! makes a watched object ready records the reason for the poller and makes
//! it runnable; the poller then copies the results into its events and
//! removes its registrations.
//!
//! An object accepts one live poller at a time. A second concurrent poll on
//! the same object fails with [`PollError::AddressInUse`] and leaves no
//! registration behind.

pub mod signal;

pub use signal::PollSignal;

use crate::arch::Port;
use crate::errors::{kassert, PollError};
use crate::kernel::Kernel;
use crate::sched::{SchedState, WaitQueue};
use crate::thread::{ThreadId, ThreadState};
use crate::time::Timeout;

/// Condition an event waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollType {
    /// A semaphore with a non-zero count
    SemAvailable,
    /// A FIFO holding at least one item
    FifoDataAvailable,
    /// A raised [`PollSignal`]
    Signal,
}

impl PollType {
    fn ready_state(self) -> PollState {
        match self {
            PollType::SemAvailable => PollState::SemAvailable,
            PollType::FifoDataAvailable => PollState::FifoDataAvailable,
            PollType::Signal => PollState::Signaled,
        }
    }
}

/// What a poll call does once an event is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Report readiness; the caller takes the resource itself
    NotifyOnly,
    /// Hand the resource to the poller directly. Not supported.
    DirectWakeup,
}

/// Readiness recorded in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    NotReady,
    SemAvailable,
    FifoDataAvailable,
    Signaled,
    /// The object already had a live poller when this call tried to register
    AddressInUse,
}

mod private {
    pub trait Sealed {}
}

/// Kernel objects an event can watch.
///
/// Implemented by [`Semaphore`](crate::sync::Semaphore),
/// [`Fifo`](crate::sync::Fifo) and [`PollSignal`].
pub trait Pollable: private::Sealed + Sync {
    /// The event type this object satisfies.
    fn poll_type(&self) -> PollType;

    /// Whether the watched condition holds. Called under the interrupt lock.
    #[doc(hidden)]
    fn condition_met(&self) -> bool;

    #[doc(hidden)]
    fn poller_slot(&self) -> &PollerSlot;
}

pub(crate) use private::Sealed;

/// Identifies one event of one poll call on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollerRef {
    thread: ThreadId,
    call: u64,
    index: usize,
}

/// Poller registration slot embedded in every pollable object.
///
/// Holds at most one reference. A reference whose poll call has ended, or
/// whose thread has exited, is stale: it counts as empty and the next
/// producer or registration that sees it drops it.
pub struct PollerSlot {
    poller: spin::Mutex<Option<PollerRef>>,
}

impl PollerSlot {
    pub const fn new() -> Self {
        Self {
            poller: spin::Mutex::new(None),
        }
    }

    fn register(&self, sched: &SchedState, poller: PollerRef) -> Result<(), PollError> {
        let mut slot = self.poller.lock();
        if let Some(existing) = *slot {
            if sched.poller_is_live(existing) {
                return Err(PollError::AddressInUse);
            }
        }
        *slot = Some(poller);
        Ok(())
    }

    /// Clear the slot if it still holds `poller`.
    fn unregister(&self, poller: PollerRef) {
        let mut slot = self.poller.lock();
        if *slot == Some(poller) {
            *slot = None;
        }
    }

    /// Report `state` to the registered poller, if any.
    ///
    /// # Returns
    ///
    /// Whether the running thread must now give way to a more urgent one.
    pub(crate) fn notify(&self, sched: &mut SchedState, state: PollState) -> bool {
        let mut slot = self.poller.lock();
        let Some(poller) = *slot else {
            return false;
        };
        if !sched.signal_poll_event(poller, state) {
            *slot = None;
            return false;
        }
        drop(slot);
        sched.must_switch()
    }

    /// Whether a reference is currently stored, live or stale.
    pub fn is_registered(&self) -> bool {
        self.poller.lock().is_some()
    }
}

impl Default for PollerSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One condition to wait for in a [`Kernel::poll`] call.
///
/// `state` is an output: it is set for every event found ready. The caller
/// resets it (see [`PollEvent::reset`]) before reusing the event. `tag` is
/// never touched by the kernel.
pub struct PollEvent<'a> {
    pub state: PollState,
    pub tag: u32,
    poll_type: PollType,
    mode: PollMode,
    object: &'a dyn Pollable,
}

impl<'a> PollEvent<'a> {
    /// Build an event watching `object`.
    ///
    /// # Panics
    ///
    /// On a mode other than [`PollMode::NotifyOnly`], or when `poll_type`
    /// does not match the kind of object.
    pub fn new(poll_type: PollType, mode: PollMode, object: &'a dyn Pollable) -> Self {
        kassert!(mode == PollMode::NotifyOnly, "unsupported poll mode {:?}", mode);
        kassert!(
            object.poll_type() == poll_type,
            "poll type {:?} on a {:?} object",
            poll_type,
            object.poll_type()
        );
        Self {
            state: PollState::NotReady,
            tag: 0,
            poll_type,
            mode,
            object,
        }
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    pub fn poll_type(&self) -> PollType {
        self.poll_type
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn is_ready(&self) -> bool {
        self.state != PollState::NotReady && self.state != PollState::AddressInUse
    }

    pub fn reset(&mut self) {
        self.state = PollState::NotReady;
    }
}

impl SchedState {
    fn poller_is_live(&self, poller: PollerRef) -> bool {
        self.thread(poller.thread)
            .and_then(|tcb| tcb.poller.as_ref())
            .map_or(false, |state| state.call == poller.call)
    }

    /// Record `state` for a live poller and make it runnable if it is
    /// blocked in its poll call. Returns `false` if the reference is stale.
    pub(crate) fn signal_poll_event(&mut self, poller: PollerRef, state: PollState) -> bool {
        let Some(tcb) = self.thread_mut(poller.thread) else {
            return false;
        };
        let Some(call) = tcb.poller.as_mut().filter(|call| call.call == poller.call) else {
            return false;
        };
        if let Some(slot) = call.ready.get_mut(poller.index) {
            *slot = Some(state);
        }

        if tcb.state == ThreadState::Pending {
            self.unpend(poller.thread);
            self.wake(poller.thread, None);
        }
        true
    }
}

impl<P: Port> Kernel<P> {
    /// Wait until at least one of `events` is ready.
    ///
    /// Every event found ready gets its `state` set; the others keep theirs.
    /// With [`Timeout::NoWait`] this only scans. A blocking call may not be
    /// made from interrupt context.
    ///
    /// # Returns
    ///
    /// `Ok(())` when at least one event is ready, `TimedOut` when none became
    /// ready in time, `AddressInUse` when a watched object already has a live
    /// poller (that event's state is set to [`PollState::AddressInUse`]).
    ///
    /// # Panics
    ///
    /// On an empty `events` slice.
    pub fn poll(&self, events: &mut [PollEvent<'_>], timeout: Timeout) -> Result<(), PollError> {
        kassert!(!events.is_empty(), "poll with no events");

        let mut guard = self.lock();

        let mut ready = false;
        for event in events.iter_mut() {
            if event.object.condition_met() {
                event.state = event.poll_type.ready_state();
                ready = true;
            }
        }
        if ready {
            return Ok(());
        }
        if timeout.is_no_wait() {
            return Err(PollError::TimedOut);
        }
        kassert!(!guard.in_isr(), "blocking poll from interrupt context");

        let thread = guard.current();
        let call = guard.begin_poll(events.len());
        let poller = |index| PollerRef {
            thread,
            call,
            index,
        };

        for index in 0..events.len() {
            let object = events[index].object;
            if let Err(err) = object.poller_slot().register(&guard, poller(index)) {
                log::warn!(
                    "thread {}: poll event {} watches an object with a live poller",
                    thread,
                    index
                );
                events[index].state = PollState::AddressInUse;
                for (earlier, event) in events[..index].iter().enumerate() {
                    event.object.poller_slot().unregister(poller(earlier));
                }
                guard.end_poll();
                return Err(err);
            }
        }

        // Producers reach the poller through the object slots; this queue
        // only owns the pended thread for the duration of the call.
        let poll_q = WaitQueue::new();
        guard.pend_current(Some(&poll_q), timeout);
        self.swap(guard);

        let mut guard = self.lock();
        let results = guard.end_poll();
        for (index, event) in events.iter_mut().enumerate() {
            event.object.poller_slot().unregister(poller(index));
            if let Some(state) = results.as_ref().and_then(|r| r.ready[index]) {
                event.state = state;
                ready = true;
            }
        }
        drop(guard);

        if ready {
            Ok(())
        } else {
            Err(PollError::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Semaphore;

    #[test]
    fn test_event_defaults() {
        let sem = Semaphore::new(0, 1);
        let event = PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, &sem).with_tag(9);
        assert_eq!(event.state, PollState::NotReady);
        assert_eq!(event.tag, 9);
        assert_eq!(event.poll_type(), PollType::SemAvailable);
        assert!(!event.is_ready());
    }

    #[test]
    #[should_panic(expected = "unsupported poll mode")]
    fn test_direct_wakeup_rejected() {
        let sem = Semaphore::new(0, 1);
        let _ = PollEvent::new(PollType::SemAvailable, PollMode::DirectWakeup, &sem);
    }

    #[test]
    #[should_panic(expected = "poll type")]
    fn test_mismatched_type_rejected() {
        let signal = PollSignal::new();
        let _ = PollEvent::new(PollType::FifoDataAvailable, PollMode::NotifyOnly, &signal);
    }

    #[test]
    fn test_stale_registration_is_replaced() {
        let mut sched = SchedState::new(4);
        let slot = PollerSlot::new();
        let gone = PollerRef {
            thread: ThreadId::new(9),
            call: 0,
            index: 0,
        };
        slot.register(&sched, gone).unwrap();
        assert!(slot.is_registered());

        // The referenced thread does not exist, so a producer drops the ref.
        assert!(!slot.notify(&mut sched, PollState::SemAvailable));
        assert!(!slot.is_registered());

        let other = PollerRef {
            thread: ThreadId::new(10),
            call: 1,
            index: 2,
        };
        slot.register(&sched, gone).unwrap();
        slot.register(&sched, other).unwrap();
        slot.unregister(gone);
        assert!(slot.is_registered());
        slot.unregister(other);
        assert!(!slot.is_registered());
    }
}
