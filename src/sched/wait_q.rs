//! Wait queues: the ordered set of threads blocked on one kernel object.

use crate::thread::{Priority, ThreadId};

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Waiter {
    thread: ThreadId,
    priority: Priority,
}

/// Threads blocked on one owning object, most urgent first.
///
/// Ordering is by priority, then by arrival among equal priorities. A clone
/// is a second handle to the same queue; a pending thread keeps one as its
/// back-reference so a timeout can detach it without knowing the owner.
///
/// Contents are only touched while the kernel's interrupt lock is held.
#[derive(Clone)]
pub(crate) struct WaitQueue {
    waiters: Arc<spin::Mutex<VecDeque<Waiter>>>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            waiters: Arc::new(spin::Mutex::new(VecDeque::new())),
        }
    }

    /// Insert behind every waiter of equal or higher priority.
    pub(crate) fn insert(&self, thread: ThreadId, priority: Priority) {
        let mut waiters = self.waiters.lock();
        let pos = waiters
            .iter()
            .position(|w| priority.is_higher_than(w.priority))
            .unwrap_or(waiters.len());
        waiters.insert(pos, Waiter { thread, priority });
    }

    pub(crate) fn pop_first(&self) -> Option<ThreadId> {
        self.waiters.lock().pop_front().map(|w| w.thread)
    }

    pub(crate) fn first(&self) -> Option<ThreadId> {
        self.waiters.lock().front().map(|w| w.thread)
    }

    pub(crate) fn remove(&self, thread: ThreadId) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.iter().position(|w| w.thread == thread) {
            Some(pos) => {
                waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn contains(&self, thread: ThreadId) -> bool {
        self.waiters.lock().iter().any(|w| w.thread == thread)
    }

    /// Whether both handles refer to the same queue.
    pub(crate) fn same_queue(&self, other: &WaitQueue) -> bool {
        Arc::ptr_eq(&self.waiters, &other.waiters)
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
