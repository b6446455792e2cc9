//! Priority-level run queue.

use crate::thread::{Priority, ThreadId};

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// One FIFO per priority level; the most urgent non-empty level wins.
///
/// The running thread is not kept here. When it is preempted it goes back to
/// the front of its level, so it resumes before peers that never ran; a
/// thread that yields or is newly readied goes to the back.
pub(crate) struct ReadyQueue {
    levels: Vec<VecDeque<ThreadId>>,
    len: usize,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        let mut levels = Vec::with_capacity(Priority::num_levels());
        for _ in 0..Priority::num_levels() {
            levels.push(VecDeque::new());
        }

        Self { levels, len: 0 }
    }

    pub(crate) fn push_back(&mut self, thread: ThreadId, priority: Priority) {
        self.levels[priority.level()].push_back(thread);
        self.len += 1;
    }

    pub(crate) fn push_front(&mut self, thread: ThreadId, priority: Priority) {
        self.levels[priority.level()].push_front(thread);
        self.len += 1;
    }

    pub(crate) fn pop_highest(&mut self) -> Option<ThreadId> {
        let level = self.levels.iter_mut().find(|level| !level.is_empty())?;
        let thread = level.pop_front();
        self.len -= 1;
        thread
    }

    pub(crate) fn highest_priority(&self) -> Option<Priority> {
        self.levels
            .iter()
            .position(|level| !level.is_empty())
            .map(Priority::from_level)
    }

    pub(crate) fn remove(&mut self, thread: ThreadId, priority: Priority) -> bool {
        let level = &mut self.levels[priority.level()];
        match level.iter().position(|&t| t == thread) {
            Some(pos) => {
                level.remove(pos);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_level_first() {
        let mut queue = ReadyQueue::new();
        queue.push_back(ThreadId::new(1), Priority::new(7));
        queue.push_back(ThreadId::new(2), Priority::new(-2));
        queue.push_back(ThreadId::new(3), Priority::IDLE);

        assert_eq!(queue.highest_priority(), Some(Priority::new(-2)));
        assert_eq!(queue.pop_highest(), Some(ThreadId::new(2)));
        assert_eq!(queue.pop_highest(), Some(ThreadId::new(1)));
        assert_eq!(queue.pop_highest(), Some(ThreadId::new(3)));
        assert_eq!(queue.pop_highest(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_preempted_thread_goes_first() {
        let mut queue = ReadyQueue::new();
        queue.push_back(ThreadId::new(1), Priority::new(4));
        queue.push_front(ThreadId::new(2), Priority::new(4));
        assert_eq!(queue.pop_highest(), Some(ThreadId::new(2)));
    }

    #[test]
    fn test_remove() {
        let mut queue = ReadyQueue::new();
        queue.push_back(ThreadId::new(1), Priority::new(4));
        assert!(!queue.remove(ThreadId::new(1), Priority::new(5)));
        assert!(queue.remove(ThreadId::new(1), Priority::new(4)));
        assert_eq!(queue.highest_priority(), None);
    }
}
