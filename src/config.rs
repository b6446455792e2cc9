//! Kernel configuration.

use crate::thread::Priority;

/// Number of cooperative priority levels (`-16..=-1`).
pub const NUM_COOP_PRIORITIES: i8 = 16;

/// Number of preemptible priority levels available to threads (`0..=14`).
pub const NUM_PREEMPT_PRIORITIES: i8 = 15;

/// Default tick rate.
pub const DEFAULT_TICKS_PER_SEC: u32 = 100;

/// Default thread table size, including the main and idle threads.
pub const DEFAULT_MAX_THREADS: usize = 32;

/// Static configuration for a [`Kernel`](crate::Kernel) instance.
///
/// ```
/// use preemptive_sync::{KernelConfig, Priority};
///
/// let config = KernelConfig::new()
///     .ticks_per_sec(1000)
///     .max_threads(8)
///     .main_priority(Priority::new(10));
/// assert_eq!(config.ticks_per_sec, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Scheduler tick frequency in Hz
    pub ticks_per_sec: u32,
    /// Maximum number of live threads
    pub max_threads: usize,
    /// Priority given to the context that calls [`Kernel::start`](crate::Kernel::start)
    pub main_priority: Priority,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            ticks_per_sec: DEFAULT_TICKS_PER_SEC,
            max_threads: DEFAULT_MAX_THREADS,
            main_priority: Priority::new(0),
        }
    }

    pub const fn ticks_per_sec(mut self, ticks_per_sec: u32) -> Self {
        self.ticks_per_sec = ticks_per_sec;
        self
    }

    pub const fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub const fn main_priority(mut self, priority: Priority) -> Self {
        self.main_priority = priority;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
