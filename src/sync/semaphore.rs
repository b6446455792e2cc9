//! Counting semaphore.

use crate::arch::Port;
use crate::errors::{kassert, SemError};
use crate::kernel::Kernel;
use crate::poll::{PollState, PollType, Pollable, PollerSlot, Sealed};
use crate::sched::WaitQueue;
use crate::time::Timeout;

struct Count {
    count: u32,
    limit: u32,
}

/// Counting semaphore bounded by `limit`.
///
/// `give` hands the unit straight to the most urgent waiter if there is
/// one; only otherwise does the count go up (saturating at the limit).
pub struct Semaphore {
    count: spin::Mutex<Count>,
    wait_q: WaitQueue,
    poller: PollerSlot,
}

impl Semaphore {
    /// # Panics
    ///
    /// If `limit` is zero or `initial` exceeds it.
    pub fn new(initial: u32, limit: u32) -> Self {
        kassert!(
            limit > 0 && initial <= limit,
            "semaphore count {} outside 0..={}",
            initial,
            limit
        );
        Self {
            count: spin::Mutex::new(Count {
                count: initial,
                limit,
            }),
            wait_q: WaitQueue::new(),
            poller: PollerSlot::new(),
        }
    }

    /// Release one unit. Safe to call from interrupt context.
    pub fn give<P: Port>(&self, kernel: &Kernel<P>) {
        let mut guard = kernel.lock();

        if let Some(thread) = guard.unpend_first(&self.wait_q) {
            guard.wake(thread, None);
            kernel.reschedule(guard);
            return;
        }

        {
            let mut count = self.count.lock();
            if count.count < count.limit {
                count.count += 1;
            }
        }
        if self.poller.notify(&mut guard, PollState::SemAvailable) {
            kernel.swap(guard);
        }
    }

    /// Acquire one unit, waiting up to `timeout`.
    pub fn take<P: Port>(&self, kernel: &Kernel<P>, timeout: Timeout) -> Result<(), SemError> {
        let mut guard = kernel.lock();
        {
            let mut count = self.count.lock();
            if count.count > 0 {
                count.count -= 1;
                return Ok(());
            }
        }
        if timeout.is_no_wait() {
            return Err(SemError::Busy);
        }

        guard.pend_current(Some(&self.wait_q), timeout);
        if kernel.swap(guard).timed_out() {
            Err(SemError::TimedOut)
        } else {
            Ok(())
        }
    }

    pub fn count<P: Port>(&self, kernel: &Kernel<P>) -> u32 {
        let _guard = kernel.lock();
        self.count.lock().count
    }

    pub fn limit(&self) -> u32 {
        self.count.lock().limit
    }

    /// Drop the count to zero. Waiters stay blocked.
    pub fn reset<P: Port>(&self, kernel: &Kernel<P>) {
        let _guard = kernel.lock();
        self.count.lock().count = 0;
    }
}

impl Sealed for Semaphore {}

impl Pollable for Semaphore {
    fn poll_type(&self) -> PollType {
        PollType::SemAvailable
    }

    fn condition_met(&self) -> bool {
        self.count.lock().count > 0
    }

    fn poller_slot(&self) -> &PollerSlot {
        &self.poller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::HostPort;
    use crate::config::KernelConfig;

    #[test]
    fn test_give_saturates_at_limit() {
        let kernel = Kernel::new(HostPort::new(), KernelConfig::new());
        let sem = Semaphore::new(0, 2);
        for _ in 0..5 {
            sem.give(&kernel);
        }
        assert_eq!(sem.count(&kernel), 2);
        assert_eq!(sem.take(&kernel, Timeout::NoWait), Ok(()));
        assert_eq!(sem.take(&kernel, Timeout::NoWait), Ok(()));
        assert_eq!(sem.take(&kernel, Timeout::NoWait), Err(SemError::Busy));
    }

    #[test]
    fn test_reset() {
        let kernel = Kernel::new(HostPort::new(), KernelConfig::new());
        let sem = Semaphore::new(3, 3);
        sem.reset(&kernel);
        assert_eq!(sem.count(&kernel), 0);
        assert_eq!(sem.limit(), 3);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_initial_above_limit() {
        let _ = Semaphore::new(4, 3);
    }
}
