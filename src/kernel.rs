//! Kernel context: interrupt-lock guard, the swap primitive and thread
//! lifecycle.
//!
//! All scheduler state lives in one [`Kernel`] value. Operations that touch
//! it take the interrupt lock through `Kernel::lock`, which hands back an
//! `IrqGuard`. The guard either drops (restoring the saved interrupt state)
//! or is consumed by `Kernel::swap`, which releases the lock as part of the
//! context switch. Holding the guard across a swap is therefore impossible.

use crate::arch::{IrqKey, Port};
use crate::config::KernelConfig;
use crate::errors::{kassert, SpawnError};
use crate::sched::SchedState;
use crate::thread::{Priority, SwapStatus, Tcb, ThreadId, ThreadState};
use crate::time::{Duration, Timeout};
use core::any::Any;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

extern crate alloc;
use alloc::boxed::Box;

/// Main kernel handle.
///
/// A kernel is created with a [`Port`] and a [`KernelConfig`], placed in
/// static storage, then [`start`](Kernel::start)ed from the context that
/// becomes the main thread.
///
/// # Type Parameters
///
/// * `P` - Architecture port providing the interrupt lock and context switch
pub struct Kernel<P: Port> {
    port: P,
    config: KernelConfig,
    /// Scheduler state; only locked with interrupts masked
    state: spin::Mutex<SchedState>,
    started: AtomicBool,
    /// Next thread ID to assign
    next_thread_id: AtomicUsize,
}

/// Scoped interrupt lock over the scheduler state.
///
/// Dropping the guard releases the state and then restores the interrupt
/// mask saved when it was taken.
pub(crate) struct IrqGuard<'k, P: Port> {
    kernel: &'k Kernel<P>,
    key: IrqKey,
    state: ManuallyDrop<spin::MutexGuard<'k, SchedState>>,
}

impl<P: Port> Deref for IrqGuard<'_, P> {
    type Target = SchedState;

    fn deref(&self) -> &SchedState {
        &self.state
    }
}

impl<P: Port> DerefMut for IrqGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut SchedState {
        &mut self.state
    }
}

impl<'k, P: Port> IrqGuard<'k, P> {
    /// Split the guard without restoring interrupts. The caller becomes
    /// responsible for the returned key.
    fn into_parts(self) -> (IrqKey, spin::MutexGuard<'k, SchedState>) {
        let mut this = ManuallyDrop::new(self);
        // Safety: `this` is never dropped, so the state guard is taken once.
        let state = unsafe { ManuallyDrop::take(&mut this.state) };
        (this.key, state)
    }
}

impl<P: Port> Drop for IrqGuard<'_, P> {
    fn drop(&mut self) {
        // Safety: the state guard is dropped exactly once, here, and the key
        // comes from the irq_lock taken in `Kernel::lock`.
        unsafe {
            ManuallyDrop::drop(&mut self.state);
            self.kernel.port.irq_unlock(self.key);
        }
    }
}

/// Outcome of a swap as seen by the thread once it runs again.
pub(crate) struct SwapResult {
    pub(crate) status: SwapStatus,
    pub(crate) data: Option<Box<dyn Any + Send>>,
}

impl SwapResult {
    pub(crate) fn timed_out(&self) -> bool {
        self.status == SwapStatus::TimedOut
    }
}

impl<P: Port> Kernel<P> {
    /// Create a new kernel instance.
    ///
    /// # Arguments
    ///
    /// * `port` - Architecture port
    /// * `config` - Tick rate, thread table size and main thread priority
    pub fn new(port: P, config: KernelConfig) -> Self {
        Self {
            port,
            state: spin::Mutex::new(SchedState::new(config.max_threads)),
            config,
            started: AtomicBool::new(false),
            next_thread_id: AtomicUsize::new(1), // Start from 1, never use 0
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Check if the kernel has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Mask interrupts and lock the scheduler state.
    pub(crate) fn lock(&self) -> IrqGuard<'_, P> {
        let key = self.port.irq_lock();
        let state = self.state.lock();
        IrqGuard {
            kernel: self,
            key,
            state: ManuallyDrop::new(state),
        }
    }

    /// Switch away from the running thread and block until it is resumed.
    ///
    /// If the running thread is still runnable it is preempted and stays at
    /// the front of its priority level. Otherwise it must already be pending.
    /// The interrupt lock is released as part of the switch and the saved
    /// interrupt state is restored on return.
    ///
    /// # Returns
    ///
    /// The status and optional value left for the thread by whoever made it
    /// runnable again.
    pub(crate) fn swap(&self, guard: IrqGuard<'_, P>) -> SwapResult {
        let (key, mut state) = guard.into_parts();

        kassert!(!state.in_isr(), "swap from interrupt context");
        if let Some(context) = self.port.current_context() {
            kassert!(
                state.current_id() == Some(context),
                "swap from thread {} which is not the running thread",
                context
            );
        }

        let (from, to) = state.switch_out();
        drop(state);

        if from == to {
            // Safety: key comes from the irq_lock that produced the guard.
            unsafe { self.port.irq_unlock(key) };
        } else {
            log::trace!("swap {} -> {}", from, to);
            // Safety: interrupts are masked by the lock that produced `key`
            // and we are running as `from`.
            unsafe { self.port.context_switch(from, to, key) };
        }

        let mut guard = self.lock();
        let tcb = guard.current_tcb_mut();
        SwapResult {
            status: tcb.swap_status,
            data: tcb.swap_data.take(),
        }
    }

    /// Swap only if a more urgent thread became ready; otherwise release.
    pub(crate) fn reschedule(&self, guard: IrqGuard<'_, P>) {
        if guard.must_switch() {
            self.swap(guard);
        }
    }

    fn next_thread_id(&self) -> ThreadId {
        ThreadId::new(self.next_thread_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Start the kernel from the calling context.
    ///
    /// The caller becomes the main thread at the configured priority and the
    /// idle thread is created at the lowest level.
    ///
    /// # Returns
    ///
    /// The main thread's ID, or `AlreadyStarted` on a second call.
    pub fn start(&'static self) -> Result<ThreadId, SpawnError> {
        let main_priority = self.config.main_priority;
        if !main_priority.is_valid_for_thread() {
            return Err(SpawnError::InvalidPriority(main_priority.get()));
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SpawnError::AlreadyStarted);
        }

        let main = self.next_thread_id();
        let idle = self.next_thread_id();

        let mut guard = self.lock();
        guard.adopt_running(Tcb::new(main, Some("main"), main_priority))?;
        guard.add_thread(Tcb::new(idle, Some("idle"), Priority::IDLE))?;
        self.port.adopt_context(main);
        self.port
            .create_context(idle, Some("idle"), Box::new(move || self.idle_loop()));
        drop(guard);

        log::debug!(
            "kernel started: main thread {} at priority {}, {} ticks/s",
            main,
            main_priority.get(),
            self.config.ticks_per_sec
        );
        Ok(main)
    }

    /// Spawn a new thread.
    ///
    /// A thread more urgent than a preemptible caller runs before this
    /// returns.
    ///
    /// # Arguments
    ///
    /// * `name` - Optional name for diagnostics
    /// * `priority` - Cooperative or preemptible priority
    /// * `f` - Entry point; the thread exits when it returns
    pub fn spawn<F>(
        &'static self,
        name: Option<&'static str>,
        priority: Priority,
        f: F,
    ) -> Result<ThreadId, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_started() {
            return Err(SpawnError::NotStarted);
        }
        if !priority.is_valid_for_thread() {
            return Err(SpawnError::InvalidPriority(priority.get()));
        }

        let id = self.next_thread_id();
        let mut guard = self.lock();
        guard.add_thread(Tcb::new(id, name, priority))?;
        self.port.create_context(
            id,
            name,
            Box::new(move || {
                f();
                self.exit_current();
            }),
        );

        log::debug!(
            "spawned thread {} ({}) at priority {}",
            id,
            name.unwrap_or("unnamed"),
            priority.get()
        );

        self.reschedule(guard);
        Ok(id)
    }

    /// Retire the running thread and hand the processor to the next one.
    ///
    /// Any poller registration still naming this thread becomes stale and is
    /// dropped by the next producer that finds it.
    fn exit_current(&self) {
        let mut guard = self.lock();
        kassert!(!guard.in_isr(), "thread exit from interrupt context");
        let tcb = guard.remove_current();
        let next = guard.switch_to_next();

        log::debug!("thread {} ({}) exited", tcb.id, tcb.name.unwrap_or("unnamed"));

        // Interrupts stay masked until `next` restores its own key.
        let (_key, state) = guard.into_parts();
        drop(state);
        // Safety: interrupts are masked and the exiting thread is running.
        unsafe { self.port.context_exit(tcb.id, next) };
    }

    /// The running thread, once the kernel is started.
    pub fn current(&self) -> Option<ThreadId> {
        self.lock().current_id()
    }

    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        match self.lock().thread(id) {
            Some(tcb) => Some(tcb.state),
            None if id.get() < self.next_thread_id.load(Ordering::Acquire) => {
                Some(ThreadState::Terminated)
            }
            None => None,
        }
    }

    pub fn thread_priority(&self, id: ThreadId) -> Option<Priority> {
        self.lock().thread(id).map(|tcb| tcb.priority)
    }

    /// Change the priority of a live thread, repositioning it in whatever
    /// queue holds it. Unknown threads are ignored.
    pub fn set_priority(&self, id: ThreadId, priority: Priority) -> Result<(), SpawnError> {
        if !priority.is_valid_for_thread() {
            return Err(SpawnError::InvalidPriority(priority.get()));
        }
        let mut guard = self.lock();
        guard.set_priority(id, priority);
        self.reschedule(guard);
        Ok(())
    }

    /// Let other ready threads of the same or higher priority run.
    pub fn yield_now(&self) {
        let mut guard = self.lock();
        kassert!(!guard.in_isr(), "yield from interrupt context");
        if guard.yield_current() {
            self.swap(guard);
        }
    }

    /// Block the running thread for `timeout`.
    ///
    /// `NoWait` only yields; `Forever` suspends the thread for good.
    pub fn sleep(&self, timeout: Timeout) {
        if timeout.is_no_wait() {
            self.yield_now();
            return;
        }
        let mut guard = self.lock();
        kassert!(!guard.in_isr(), "sleep from interrupt context");
        guard.pend_current(None, timeout);
        self.swap(guard);
    }

    /// Ticks elapsed since the kernel was created.
    pub fn uptime_ticks(&self) -> u64 {
        self.lock().ticks()
    }

    /// Convert a duration to a timeout at this kernel's tick rate.
    pub fn timeout(&self, duration: Duration) -> Timeout {
        Timeout::from_duration(duration, self.config.ticks_per_sec)
    }

    /// Whether the caller is running in interrupt context.
    pub fn in_isr(&self) -> bool {
        self.lock().in_isr()
    }

    /// Run `f` as an interrupt handler.
    ///
    /// Wakeups performed inside `f` never switch immediately; when the
    /// outermost handler returns, the interrupted thread is preempted if a
    /// more urgent thread became ready.
    pub fn irq_context<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock().enter_isr();
        let result = f();

        let mut guard = self.lock();
        if guard.exit_isr() == 0 && guard.must_switch() {
            log::trace!("preempting thread {} on interrupt exit", guard.current());
            self.swap(guard);
        }
        result
    }

    /// Advance the tick counter and expire due timeouts. Must be called from
    /// interrupt context, typically the system timer handler.
    pub fn announce_ticks(&self, ticks: u64) {
        let mut guard = self.lock();
        kassert!(guard.in_isr(), "tick announced outside interrupt context");
        guard.advance(ticks);
        let expired = guard.expire_timeouts();
        if expired > 0 {
            log::trace!(
                "tick {}: {} timeout(s) expired, {} still armed",
                guard.ticks(),
                expired,
                guard.armed_timeouts()
            );
        }
    }

    /// Body of the idle thread.
    ///
    /// Hands the processor to any ready thread. With nothing ready, time
    /// jumps to the next armed deadline; with nothing armed, the processor
    /// waits for an external interrupt.
    fn idle_loop(&self) -> ! {
        loop {
            let guard = self.lock();
            if guard.has_ready() {
                self.swap(guard);
                continue;
            }

            match guard.next_deadline() {
                Some(deadline) => {
                    let delta = deadline.saturating_sub(guard.ticks()).max(1);
                    drop(guard);
                    self.irq_context(|| self.announce_ticks(delta));
                }
                None => {
                    drop(guard);
                    log::debug!("idle: no runnable thread and no armed timeout");
                    self.port.wait_for_interrupt();
                }
            }
        }
    }
}
