//! Test helper utilities and common functionality.

use crate::arch::HostPort;
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::thread::Priority;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Priority of the test thread once the kernel is started.
pub(crate) const MAIN_PRIORITY: Priority = Priority::new(10);

/// Leak a kernel and start it with the calling thread as main.
pub(crate) fn boot() -> &'static Kernel<HostPort> {
    boot_with(KernelConfig::new().main_priority(MAIN_PRIORITY))
}

pub(crate) fn boot_with(config: KernelConfig) -> &'static Kernel<HostPort> {
    let kernel = leak(Kernel::new(HostPort::new(), config));
    kernel.start().unwrap();
    kernel
}

/// Leak a value so kernel threads can borrow it for `'static`.
pub(crate) fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Ordered record of what each thread observed.
///
/// Only one kernel thread executes at a time and none switches while
/// holding the lock, so the lock is never contended.
pub(crate) struct Trace<T> {
    events: Arc<spin::Mutex<Vec<T>>>,
}

impl<T> Clone for Trace<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T> Trace<T> {
    pub(crate) fn new() -> Self {
        Self {
            events: Arc::new(spin::Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, event: T) {
        self.events.lock().push(event);
    }

    pub(crate) fn take(&self) -> Vec<T> {
        core::mem::take(&mut *self.events.lock())
    }
}
