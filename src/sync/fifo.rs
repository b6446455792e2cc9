//! Dynamic FIFO: an unbounded queue with blocking get.
//!
//! The FIFO holds either queued data or waiting consumers, never both. A put
//! with a waiter present hands the item straight to the most urgent waiter
//! through its swap slot; the data queue is only used when nobody waits.

use super::slist::SList;
use crate::arch::Port;
use crate::errors::{contract_violation, kassert};
use crate::kernel::{IrqGuard, Kernel};
use crate::poll::{PollState, PollType, Pollable, PollerSlot, Sealed};
use crate::sched::WaitQueue;
use crate::time::Timeout;
use core::any::Any;

extern crate alloc;
use alloc::boxed::Box;

pub struct Fifo<T> {
    data: spin::Mutex<SList<T>>,
    wait_q: WaitQueue,
    poller: PollerSlot,
}

impl<T: Send + 'static> Fifo<T> {
    pub fn new() -> Self {
        Self {
            data: spin::Mutex::new(SList::new()),
            wait_q: WaitQueue::new(),
            poller: PollerSlot::new(),
        }
    }

    /// Add `item` at the tail, or hand it to the most urgent waiting thread.
    ///
    /// Safe to call from interrupt context; the switch to a woken thread is
    /// then deferred to interrupt exit.
    pub fn put<P: Port>(&self, kernel: &Kernel<P>, item: T) {
        let mut guard = kernel.lock();

        if let Some(thread) = guard.unpend_first(&self.wait_q) {
            log::trace!("fifo: handing item to thread {}", thread);
            guard.wake(thread, Some(Box::new(item)));
            kernel.reschedule(guard);
            return;
        }

        self.data.lock().append(item);
        if self.poller.notify(&mut guard, PollState::FifoDataAvailable) {
            kernel.swap(guard);
        }
    }

    /// Bulk put. Items go to waiters one each, most urgent waiter first,
    /// and whatever is left is appended in order. A single reschedule
    /// decision covers the whole batch.
    ///
    /// # Panics
    ///
    /// On an empty list.
    pub fn put_slist<P: Port>(&self, kernel: &Kernel<P>, mut list: SList<T>) {
        kassert!(!list.is_empty(), "fifo bulk put with an empty list");

        let mut guard = kernel.lock();
        let had_waiters = guard.peek_first(&self.wait_q).is_some();

        while !list.is_empty() {
            let Some(thread) = guard.unpend_first(&self.wait_q) else {
                break;
            };
            let item = list.get().map(|item| Box::new(item) as Box<dyn Any + Send>);
            guard.wake(thread, item);
        }

        let mut switch = false;
        if !list.is_empty() {
            self.data.lock().append_list(list);
            switch = self.poller.notify(&mut guard, PollState::FifoDataAvailable);
        }
        if had_waiters {
            switch |= guard.must_switch();
        }

        if switch {
            kernel.swap(guard);
        }
    }

    /// Bulk put from any sequence of items. See [`put_slist`](Fifo::put_slist).
    pub fn put_list<P, I>(&self, kernel: &Kernel<P>, items: I)
    where
        P: Port,
        I: IntoIterator<Item = T>,
    {
        self.put_slist(kernel, items.into_iter().collect());
    }

    /// Remove the head item, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` if the FIFO was empty and `timeout` was `NoWait`, or if
    /// it expired first. Only `NoWait` is allowed from interrupt context.
    pub fn get<P: Port>(&self, kernel: &Kernel<P>, timeout: Timeout) -> Option<T> {
        let guard = kernel.lock();
        if let Some(item) = self.data.lock().get() {
            return Some(item);
        }
        if timeout.is_no_wait() {
            return None;
        }
        self.get_blocking(kernel, guard, timeout)
    }

    #[cold]
    fn get_blocking<P: Port>(
        &self,
        kernel: &Kernel<P>,
        mut guard: IrqGuard<'_, P>,
        timeout: Timeout,
    ) -> Option<T> {
        guard.pend_current(Some(&self.wait_q), timeout);
        let result = kernel.swap(guard);
        if result.timed_out() {
            return None;
        }
        match result.data.map(|data| data.downcast::<T>()) {
            Some(Ok(item)) => Some(*item),
            _ => contract_violation(format_args!("fifo waiter woken without an item")),
        }
    }

    pub fn is_empty<P: Port>(&self, kernel: &Kernel<P>) -> bool {
        let _guard = kernel.lock();
        self.data.lock().is_empty()
    }

    pub fn len<P: Port>(&self, kernel: &Kernel<P>) -> usize {
        let _guard = kernel.lock();
        self.data.lock().len()
    }

    /// Look at the head item without removing it.
    pub fn peek_head<P: Port, R>(&self, kernel: &Kernel<P>, f: impl FnOnce(&T) -> R) -> Option<R> {
        let _guard = kernel.lock();
        self.data.lock().peek_head().map(f)
    }

    /// Number of threads blocked in [`get`](Fifo::get).
    pub fn waiters(&self) -> usize {
        self.wait_q.len()
    }
}

impl<T: Send + 'static> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Sealed for Fifo<T> {}

impl<T: Send> Pollable for Fifo<T> {
    fn poll_type(&self) -> PollType {
        PollType::FifoDataAvailable
    }

    fn condition_met(&self) -> bool {
        !self.data.lock().is_empty()
    }

    fn poller_slot(&self) -> &PollerSlot {
        &self.poller
    }
}
