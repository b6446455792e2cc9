//! Scheduler state: thread table, ready queue, armed timeouts.
//!
//! Everything here is only reachable through the kernel's interrupt-lock
//! guard, so every mutation is linearized by the interrupt lock. None of
//! these operations block.

mod ready;
mod wait_q;

pub(crate) use wait_q::WaitQueue;

use crate::errors::{contract_violation, kassert, SpawnError};
use crate::thread::{PollerState, Priority, SwapStatus, Tcb, ThreadId, ThreadState};
use crate::time::{Timeout, TimeoutQueue};
use core::any::Any;
use ready::ReadyQueue;

extern crate alloc;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;

pub(crate) struct SchedState {
    threads: BTreeMap<ThreadId, Tcb>,
    ready: ReadyQueue,
    current: Option<ThreadId>,
    timeouts: TimeoutQueue,
    ticks: u64,
    isr_nesting: u32,
    next_poll_call: u64,
    max_threads: usize,
}

impl SchedState {
    pub(crate) fn new(max_threads: usize) -> Self {
        Self {
            threads: BTreeMap::new(),
            ready: ReadyQueue::new(),
            current: None,
            timeouts: TimeoutQueue::new(),
            ticks: 0,
            isr_nesting: 0,
            next_poll_call: 0,
            max_threads,
        }
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn in_isr(&self) -> bool {
        self.isr_nesting > 0
    }

    pub(crate) fn enter_isr(&mut self) {
        self.isr_nesting += 1;
    }

    /// Leave one interrupt level; returns the remaining nesting depth.
    pub(crate) fn exit_isr(&mut self) -> u32 {
        kassert!(self.isr_nesting > 0, "interrupt exit without entry");
        self.isr_nesting -= 1;
        self.isr_nesting
    }

    // ------------------------------------------------------------------
    // Thread table
    // ------------------------------------------------------------------

    pub(crate) fn thread(&self, id: ThreadId) -> Option<&Tcb> {
        self.threads.get(&id)
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Tcb> {
        self.threads.get_mut(&id)
    }

    pub(crate) fn current_id(&self) -> Option<ThreadId> {
        self.current
    }

    pub(crate) fn current(&self) -> ThreadId {
        match self.current {
            Some(id) => id,
            None => contract_violation(format_args!("no current thread")),
        }
    }

    pub(crate) fn current_tcb_mut(&mut self) -> &mut Tcb {
        let id = self.current();
        match self.threads.get_mut(&id) {
            Some(tcb) => tcb,
            None => contract_violation(format_args!("current thread {} not in table", id)),
        }
    }

    /// Add a new thread to the table and the ready queue.
    pub(crate) fn add_thread(&mut self, tcb: Tcb) -> Result<(), SpawnError> {
        if self.threads.len() >= self.max_threads {
            return Err(SpawnError::TooManyThreads);
        }
        let (id, priority) = (tcb.id, tcb.priority);
        self.threads.insert(id, tcb);
        self.ready.push_back(id, priority);
        Ok(())
    }

    /// Install the thread that is already executing (the main context).
    pub(crate) fn adopt_running(&mut self, mut tcb: Tcb) -> Result<(), SpawnError> {
        if self.threads.len() >= self.max_threads {
            return Err(SpawnError::TooManyThreads);
        }
        kassert!(self.current.is_none(), "a thread is already running");
        tcb.state = ThreadState::Running;
        self.current = Some(tcb.id);
        self.threads.insert(tcb.id, tcb);
        Ok(())
    }

    /// Take the running thread out of the table.
    pub(crate) fn remove_current(&mut self) -> Tcb {
        let id = self.current();
        let Some(mut tcb) = self.threads.remove(&id) else {
            contract_violation(format_args!("current thread {} not in table", id))
        };
        kassert!(
            tcb.pended_on.is_none() && tcb.poller.is_none(),
            "thread {} exiting while registered as a waiter",
            id
        );
        tcb.state = ThreadState::Terminated;
        self.current = None;
        tcb
    }

    pub(crate) fn set_priority(&mut self, id: ThreadId, priority: Priority) -> bool {
        let Some(tcb) = self.threads.get_mut(&id) else {
            return false;
        };
        let old = tcb.priority;
        tcb.priority = priority;
        match tcb.state {
            ThreadState::Ready => {
                self.ready.remove(id, old);
                self.ready.push_back(id, priority);
            }
            ThreadState::Pending => {
                if let Some(queue) = &tcb.pended_on {
                    queue.remove(id);
                    queue.insert(id, priority);
                }
            }
            ThreadState::Running | ThreadState::Terminated => {}
        }
        true
    }

    // ------------------------------------------------------------------
    // Wait queue operations
    // ------------------------------------------------------------------

    /// Block the running `thread` on `queue`, or on nothing for a plain
    /// sleep, arming a timeout unless `timeout` is infinite.
    pub(crate) fn pend(&mut self, queue: Option<&WaitQueue>, thread: ThreadId, timeout: Timeout) {
        let Some(tcb) = self.threads.get_mut(&thread) else {
            contract_violation(format_args!("pend of unknown thread {}", thread))
        };
        kassert!(
            tcb.state == ThreadState::Running,
            "thread {} pended while {:?}",
            thread,
            tcb.state
        );
        kassert!(
            tcb.pended_on.is_none(),
            "thread {} already pending on another wait queue",
            thread
        );

        tcb.state = ThreadState::Pending;
        tcb.swap_status = SwapStatus::TimedOut;
        tcb.swap_data = None;

        if let Some(queue) = queue {
            queue.insert(thread, tcb.priority);
            tcb.pended_on = Some(queue.clone());
        }
        match timeout.as_ticks() {
            Some(ticks) => {
                let key = self.timeouts.arm(self.ticks, ticks, thread);
                log::trace!("thread {} pending until tick {}", thread, key.deadline());
                tcb.timeout = Some(key);
            }
            None => log::trace!("thread {} pending", thread),
        }
    }

    pub(crate) fn pend_current(&mut self, queue: Option<&WaitQueue>, timeout: Timeout) {
        let thread = self.current();
        self.pend(queue, thread, timeout);
    }

    /// Detach the most urgent waiter from `queue`.
    pub(crate) fn unpend_first(&mut self, queue: &WaitQueue) -> Option<ThreadId> {
        let thread = queue.pop_first()?;
        let Some(tcb) = self.threads.get_mut(&thread) else {
            contract_violation(format_args!("wait queue holds unknown thread {}", thread))
        };
        let owned = tcb
            .pended_on
            .take()
            .map_or(false, |pended| pended.same_queue(queue));
        kassert!(owned, "wait queue holds thread {} pending elsewhere", thread);
        Some(thread)
    }

    pub(crate) fn peek_first(&self, queue: &WaitQueue) -> Option<ThreadId> {
        queue.first()
    }

    /// Detach `thread` from whatever wait queue it is blocked on.
    pub(crate) fn unpend(&mut self, thread: ThreadId) -> bool {
        match self.threads.get_mut(&thread).and_then(|tcb| tcb.pended_on.take()) {
            Some(queue) => queue.remove(thread),
            None => false,
        }
    }

    /// Make a detached pending thread runnable, delivering `data` through its
    /// swap slot with a successful status.
    pub(crate) fn wake(&mut self, thread: ThreadId, data: Option<Box<dyn Any + Send>>) {
        let Some(tcb) = self.threads.get_mut(&thread) else {
            contract_violation(format_args!("wake of unknown thread {}", thread))
        };
        kassert!(
            tcb.state == ThreadState::Pending && tcb.pended_on.is_none(),
            "wake of thread {} that is not detached and pending",
            thread
        );
        if let Some(key) = tcb.timeout.take() {
            self.timeouts.abort(key);
        }
        tcb.swap_status = SwapStatus::Woken;
        tcb.swap_data = data;
        tcb.state = ThreadState::Ready;
        self.ready.push_back(thread, tcb.priority);

        log::trace!("thread {} woken", thread);
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    pub(crate) fn advance(&mut self, ticks: u64) {
        self.ticks = self.ticks.saturating_add(ticks);
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.timeouts.next_deadline()
    }

    pub(crate) fn armed_timeouts(&self) -> usize {
        self.timeouts.len()
    }

    /// Resume every pending thread whose deadline has passed with a
    /// timed-out status. Returns how many were resumed.
    pub(crate) fn expire_timeouts(&mut self) -> usize {
        let mut expired = 0;
        while let Some(thread) = self.timeouts.pop_expired(self.ticks) {
            let Some(tcb) = self.threads.get_mut(&thread) else {
                continue;
            };
            tcb.timeout = None;
            if tcb.state != ThreadState::Pending {
                continue;
            }
            if let Some(queue) = tcb.pended_on.take() {
                queue.remove(thread);
            }
            tcb.swap_status = SwapStatus::TimedOut;
            tcb.state = ThreadState::Ready;
            self.ready.push_back(thread, tcb.priority);
            expired += 1;

            log::trace!("thread {} timed out at tick {}", thread, self.ticks);
        }
        expired
    }

    // ------------------------------------------------------------------
    // Rescheduling
    // ------------------------------------------------------------------

    pub(crate) fn has_ready(&self) -> bool {
        self.ready.len() > 0
    }

    /// Whether the running thread must give way right now: it is
    /// preemptible, we are not in an interrupt, and a more urgent thread is
    /// ready.
    pub(crate) fn must_switch(&self) -> bool {
        if self.in_isr() {
            return false;
        }
        let Some(current) = self.current.and_then(|id| self.threads.get(&id)) else {
            return false;
        };
        current.priority.is_preemptible()
            && self
                .ready
                .highest_priority()
                .map_or(false, |prio| prio.is_higher_than(current.priority))
    }

    /// Move the running thread to the back of its level if a peer of equal or
    /// higher priority is ready. Returns whether a switch is needed.
    pub(crate) fn yield_current(&mut self) -> bool {
        let id = self.current();
        let Some(tcb) = self.threads.get_mut(&id) else {
            return false;
        };
        let peer_ready = self
            .ready
            .highest_priority()
            .map_or(false, |prio| !tcb.priority.is_higher_than(prio));
        if peer_ready {
            tcb.state = ThreadState::Ready;
            self.ready.push_back(id, tcb.priority);
        }
        peer_ready
    }

    /// Pick the next thread to run. A thread that is still running is
    /// preempted and returns to the front of its level.
    pub(crate) fn switch_out(&mut self) -> (ThreadId, ThreadId) {
        let from = self.current();
        if let Some(tcb) = self.threads.get_mut(&from) {
            if tcb.state == ThreadState::Running {
                tcb.state = ThreadState::Ready;
                self.ready.push_front(from, tcb.priority);
            }
        }
        let to = self.switch_to_next();
        (from, to)
    }

    /// Make the most urgent ready thread the running one.
    pub(crate) fn switch_to_next(&mut self) -> ThreadId {
        let Some(next) = self.ready.pop_highest() else {
            contract_violation(format_args!("no runnable thread"))
        };
        if let Some(tcb) = self.threads.get_mut(&next) {
            tcb.state = ThreadState::Running;
        }
        self.current = Some(next);
        next
    }

    // ------------------------------------------------------------------
    // Poll bookkeeping
    // ------------------------------------------------------------------

    /// Open a poll call on the running thread with one result slot per event.
    pub(crate) fn begin_poll(&mut self, events: usize) -> u64 {
        let call = self.next_poll_call;
        self.next_poll_call += 1;
        let tcb = self.current_tcb_mut();
        kassert!(tcb.poller.is_none(), "thread {} already polling", tcb.id);
        tcb.poller = Some(PollerState {
            call,
            ready: vec![None; events],
        });
        call
    }

    pub(crate) fn end_poll(&mut self) -> Option<PollerState> {
        self.current_tcb_mut().poller.take()
    }
}
