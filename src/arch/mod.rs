//! Architecture abstraction layer for interrupt masking and context switching.
//!
//! The kernel consumes exactly two services from the architecture: an
//! interrupt lock that masks interrupts and hands back a restore key, and a
//! context switch that suspends the calling thread and resumes another one.
//! Everything else a port provides (context creation, idle wait) exists to
//! support those two.

use crate::thread::ThreadId;

extern crate alloc;
use alloc::boxed::Box;

#[cfg(any(test, feature = "std-shim"))]
pub mod host;

#[cfg(any(test, feature = "std-shim"))]
pub use host::HostPort;

/// Opaque restore key returned by [`Port::irq_lock`].
///
/// Holds the interrupt mask state in effect before the lock was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqKey(usize);

impl IrqKey {
    /// Key describing "interrupts were enabled".
    pub const UNMASKED: IrqKey = IrqKey(0);
    /// Key describing "interrupts were already masked".
    pub const MASKED: IrqKey = IrqKey(1);
}

/// Entry point handed to [`Port::create_context`].
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Architecture port trait.
///
/// # Safety
///
/// Implementations run with interrupts masked for most calls. The methods
/// marked unsafe have ordering requirements that the kernel upholds and that
/// the port may rely on.
pub trait Port: Send + Sync + 'static {
    /// Mask interrupts on the current CPU and return the previous state.
    fn irq_lock(&self) -> IrqKey;

    /// Restore the interrupt state captured by the matching [`Port::irq_lock`].
    ///
    /// # Safety
    ///
    /// `key` must come from the most recent unreleased `irq_lock` on this CPU.
    unsafe fn irq_unlock(&self, key: IrqKey);

    /// Prepare a context for thread `id` that starts in `entry` the first
    /// time it is switched to, with interrupts unmasked.
    fn create_context(&self, id: ThreadId, name: Option<&'static str>, entry: ThreadEntry);

    /// Record the calling context as thread `id` (the main thread).
    fn adopt_context(&self, id: ThreadId);

    /// Suspend `from` and resume `to`.
    ///
    /// Releasing the interrupt lock is part of the handoff: `to` resumes with
    /// its own saved key restored, and when `from` is eventually resumed this
    /// call returns with `key` restored.
    ///
    /// # Safety
    ///
    /// Must be called with interrupts masked by the `irq_lock` that produced
    /// `key`, from the context of `from`, never from interrupt context.
    unsafe fn context_switch(&self, from: ThreadId, to: ThreadId, key: IrqKey);

    /// Retire the context of `from` and resume `to`.
    ///
    /// On hardware this never returns. Hosted ports return so the backing
    /// execution context can unwind and finish.
    ///
    /// # Safety
    ///
    /// Same preconditions as [`Port::context_switch`]; `from` is never
    /// resumed afterwards.
    unsafe fn context_exit(&self, from: ThreadId, to: ThreadId);

    /// Sleep until the next interrupt. Called by the idle thread when no
    /// thread is ready and no timeout is armed.
    fn wait_for_interrupt(&self);

    /// The thread whose context is executing this call, when the port can tell.
    fn current_context(&self) -> Option<ThreadId> {
        None
    }
}
