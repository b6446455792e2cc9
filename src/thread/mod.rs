//! Thread identity, priority and the per-thread control block.

use crate::config::{NUM_COOP_PRIORITIES, NUM_PREEMPT_PRIORITIES};
use crate::poll::PollState;
use crate::sched::WaitQueue;
use crate::time::TimeoutKey;
use core::any::Any;
use core::num::NonZeroUsize;

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

pub mod builder;

pub use builder::ThreadBuilder;

/// Unique identifier for threads.
///
/// Thread IDs are never reused within one kernel and are guaranteed to be
/// non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroUsize);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ThreadId {
    /// Create a thread ID. Zero is mapped to 1.
    pub fn new(id: usize) -> Self {
        Self(NonZeroUsize::new(id).unwrap_or(NonZeroUsize::MIN))
    }

    /// Get the raw ID value.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Thread scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// In the ready queue, waiting for the processor
    Ready = 0,
    /// Currently owns the processor
    Running = 1,
    /// Blocked on a wait queue, a poll call or a sleep
    Pending = 2,
    /// Entry point returned; the thread no longer exists in the table
    Terminated = 3,
}

/// Thread priority. Lower numeric value means more urgent.
///
/// Negative values are cooperative: a running cooperative thread is never
/// switched out by a wakeup, only when it blocks or yields. Values from
/// zero upward are preemptible. The lowest level belongs to the idle thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(i8);

impl Priority {
    /// Most urgent cooperative level.
    pub const COOP_HIGHEST: Priority = Priority(-NUM_COOP_PRIORITIES);
    /// Most urgent preemptible level.
    pub const PREEMPT_HIGHEST: Priority = Priority(0);
    /// Least urgent level a regular thread may use.
    pub const PREEMPT_LOWEST: Priority = Priority(NUM_PREEMPT_PRIORITIES - 1);
    /// Reserved for the idle thread.
    pub const IDLE: Priority = Priority(NUM_PREEMPT_PRIORITIES);

    pub const fn new(value: i8) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i8 {
        self.0
    }

    pub const fn is_cooperative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_preemptible(self) -> bool {
        self.0 >= 0
    }

    /// Whether `self` should run before `other`.
    pub const fn is_higher_than(self, other: Priority) -> bool {
        self.0 < other.0
    }

    /// Whether a regular (non-idle) thread may be given this priority.
    pub const fn is_valid_for_thread(self) -> bool {
        self.0 >= Self::COOP_HIGHEST.0 && self.0 <= Self::PREEMPT_LOWEST.0
    }

    /// Index into per-level queues, 0 being the most urgent level.
    pub(crate) fn level(self) -> usize {
        (self.0 as i16 + NUM_COOP_PRIORITIES as i16) as usize
    }

    pub(crate) fn from_level(level: usize) -> Self {
        Self((level as i16 - NUM_COOP_PRIORITIES as i16) as i8)
    }

    pub(crate) const fn num_levels() -> usize {
        (NUM_COOP_PRIORITIES + NUM_PREEMPT_PRIORITIES + 1) as usize
    }
}

/// How a thread came back from a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapStatus {
    /// Woken by a producer; any delivered value is in the swap-data slot
    Woken,
    /// Timeout expired before anyone woke the thread
    TimedOut,
}

/// Per-call poll bookkeeping kept on the polling thread.
///
/// Producers write the reason into `ready[index]`; the polling thread copies
/// the results back into its events once it runs again.
pub(crate) struct PollerState {
    pub(crate) call: u64,
    pub(crate) ready: Vec<Option<PollState>>,
}

/// Thread control block.
pub(crate) struct Tcb {
    pub(crate) id: ThreadId,
    pub(crate) name: Option<&'static str>,
    pub(crate) priority: Priority,
    pub(crate) state: ThreadState,
    /// Wait queue this thread is blocked on; only set while pending.
    pub(crate) pended_on: Option<WaitQueue>,
    pub(crate) timeout: Option<TimeoutKey>,
    pub(crate) swap_status: SwapStatus,
    pub(crate) swap_data: Option<Box<dyn Any + Send>>,
    pub(crate) poller: Option<PollerState>,
}

impl Tcb {
    pub(crate) fn new(id: ThreadId, name: Option<&'static str>, priority: Priority) -> Self {
        Self {
            id,
            name,
            priority,
            state: ThreadState::Ready,
            pended_on: None,
            timeout: None,
            swap_status: SwapStatus::Woken,
            swap_data: None,
            poller: None,
        }
    }
}
