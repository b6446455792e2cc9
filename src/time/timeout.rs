//! Deadline-ordered queue of armed thread timeouts.

use crate::thread::ThreadId;

extern crate alloc;
use alloc::collections::BTreeMap;

/// Handle to one armed timeout, used to abort it.
///
/// Keys order by deadline first and arming order second, so threads whose
/// deadlines coincide expire in the order they were armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimeoutKey {
    deadline: u64,
    seq: u64,
}

impl TimeoutKey {
    pub(crate) fn deadline(self) -> u64 {
        self.deadline
    }
}

pub(crate) struct TimeoutQueue {
    armed: BTreeMap<TimeoutKey, ThreadId>,
    next_seq: u64,
}

impl TimeoutQueue {
    pub(crate) const fn new() -> Self {
        Self {
            armed: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Arm a timeout for `thread` expiring `ticks` after `now`.
    pub(crate) fn arm(&mut self, now: u64, ticks: u64, thread: ThreadId) -> TimeoutKey {
        let key = TimeoutKey {
            deadline: now.saturating_add(ticks),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.armed.insert(key, thread);
        key
    }

    /// Cancel an armed timeout. Returns `false` if it already expired.
    pub(crate) fn abort(&mut self, key: TimeoutKey) -> bool {
        self.armed.remove(&key).is_some()
    }

    /// Earliest armed deadline.
    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.armed.keys().next().map(|key| key.deadline)
    }

    /// Remove and return the next thread whose deadline is at or before `now`.
    pub(crate) fn pop_expired(&mut self, now: u64) -> Option<ThreadId> {
        let (&key, _) = self.armed.iter().next()?;
        if key.deadline > now {
            return None;
        }
        self.armed.remove(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.armed.len()
    }
}
