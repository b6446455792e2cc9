//! Hosted port for running the kernel on top of std threads.
//!
//! Every kernel thread is backed by an OS thread, but only the one holding
//! the processor baton executes; all others are parked on their own baton.
//! A context switch passes the baton to the next thread and parks the caller,
//! which gives single-core semantics: exactly one kernel thread runs at a
//! time and control only moves at swap points.
//!
//! Time is virtual. Ticks advance only when the idle thread runs, which
//! jumps straight to the next armed deadline.

use super::{IrqKey, Port, ThreadEntry};
use crate::errors::contract_violation;
use crate::thread::ThreadId;
use core::cell::Cell;
use portable_atomic::{AtomicBool, Ordering};

extern crate std;
use std::collections::BTreeMap;
use std::format;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

std::thread_local! {
    static CONTEXT: Cell<Option<ThreadId>> = const { Cell::new(None) };
}

/// Binary handoff token for one kernel thread.
struct Baton {
    held: Mutex<bool>,
    cv: Condvar,
}

impl Baton {
    fn new() -> Self {
        Self {
            held: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn pass(&self) {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cv.notify_one();
    }

    fn wait(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while !*held {
            held = self.cv.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        *held = false;
    }
}

struct HostInner {
    /// Interrupt mask of the simulated CPU
    masked: AtomicBool,
    batons: Mutex<BTreeMap<ThreadId, Arc<Baton>>>,
}

impl HostInner {
    fn batons(&self) -> MutexGuard<'_, BTreeMap<ThreadId, Arc<Baton>>> {
        self.batons.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn baton(&self, id: ThreadId) -> Arc<Baton> {
        match self.batons().get(&id) {
            Some(baton) => baton.clone(),
            None => contract_violation(format_args!("no context for thread {}", id)),
        }
    }
}

/// Single-core port backed by std threads.
pub struct HostPort {
    inner: Arc<HostInner>,
}

impl HostPort {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner {
                masked: AtomicBool::new(false),
                batons: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Whether the simulated CPU currently has interrupts masked.
    pub fn irqs_masked(&self) -> bool {
        self.inner.masked.load(Ordering::Acquire)
    }
}

impl Default for HostPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for HostPort {
    fn irq_lock(&self) -> IrqKey {
        if self.inner.masked.swap(true, Ordering::AcqRel) {
            IrqKey::MASKED
        } else {
            IrqKey::UNMASKED
        }
    }

    unsafe fn irq_unlock(&self, key: IrqKey) {
        self.inner
            .masked
            .store(key == IrqKey::MASKED, Ordering::Release);
    }

    fn create_context(&self, id: ThreadId, name: Option<&'static str>, entry: ThreadEntry) {
        let baton = Arc::new(Baton::new());
        self.inner.batons().insert(id, baton.clone());

        let inner = self.inner.clone();
        let thread_name = match name {
            Some(name) => format!("{}#{}", name, id),
            None => format!("kthread#{}", id),
        };

        let spawned = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                baton.wait();
                CONTEXT.with(|ctx| ctx.set(Some(id)));
                inner.masked.store(false, Ordering::Release);
                entry();
                CONTEXT.with(|ctx| ctx.set(None));
            });

        if let Err(err) = spawned {
            contract_violation(format_args!("cannot back thread {}: {}", id, err));
        }
    }

    fn adopt_context(&self, id: ThreadId) {
        self.inner.batons().insert(id, Arc::new(Baton::new()));
        CONTEXT.with(|ctx| ctx.set(Some(id)));
    }

    unsafe fn context_switch(&self, from: ThreadId, to: ThreadId, key: IrqKey) {
        let from_baton = self.inner.baton(from);
        let to_baton = self.inner.baton(to);

        to_baton.pass();
        from_baton.wait();

        // Resumed: this context owns the CPU again.
        unsafe { self.irq_unlock(key) };
    }

    unsafe fn context_exit(&self, from: ThreadId, to: ThreadId) {
        self.inner.batons().remove(&from);
        self.inner.baton(to).pass();
    }

    fn wait_for_interrupt(&self) {
        // Nothing external raises interrupts on the host; spurious returns
        // just send the idle thread around its loop again.
        std::thread::park();
    }

    fn current_context(&self) -> Option<ThreadId> {
        CONTEXT.with(|ctx| ctx.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_lock_nesting() {
        let port = HostPort::new();
        let outer = port.irq_lock();
        assert_eq!(outer, IrqKey::UNMASKED);
        let inner = port.irq_lock();
        assert_eq!(inner, IrqKey::MASKED);

        unsafe { port.irq_unlock(inner) };
        assert!(port.irqs_masked());
        unsafe { port.irq_unlock(outer) };
        assert!(!port.irqs_masked());
    }

    #[test]
    fn test_adopt_sets_current_context() {
        let port = HostPort::new();
        let id = ThreadId::new(42);
        let seen = std::thread::spawn(move || {
            port.adopt_context(id);
            port.current_context()
        })
        .join()
        .unwrap();
        assert_eq!(seen, Some(id));
    }
}
