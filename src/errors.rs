//! Error types for the synchronization core.
//!
//! Recoverable conditions (timeouts, a watched object that already has a
//! poller, a busy semaphore) are returned to the immediate caller as values.
//! Contract violations are not errors in this sense: they indicate a kernel
//! or caller bug and go through [`contract_violation`], which never returns.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Classic status codes, for callers bridging to C-style return values.
pub mod errno {
    /// Resource busy.
    pub const EBUSY: i32 = 16;
    /// Try again (timeout).
    pub const EAGAIN: i32 = 11;
    /// Address already in use.
    pub const EADDRINUSE: i32 = 98;
}

/// Aggregate error type for all recoverable kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Poll errors
    Poll(PollError),
    /// Semaphore errors
    Sem(SemError),
    /// Thread creation errors
    Spawn(SpawnError),
}

/// Errors returned by [`Kernel::poll`](crate::Kernel::poll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    /// No event became ready before the deadline
    TimedOut,
    /// A watched object already has an active poller; every registration
    /// made by the failing call has been rolled back
    AddressInUse,
}

/// Errors returned by [`Semaphore::take`](crate::sync::Semaphore::take).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemError {
    /// Count was zero and the caller asked not to wait
    Busy,
    /// Count stayed zero until the deadline
    TimedOut,
}

/// Errors that can occur when starting the kernel or spawning threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Kernel has not been started
    NotStarted,
    /// Kernel was already started
    AlreadyStarted,
    /// Priority outside the cooperative and preemptible ranges
    InvalidPriority(i8),
    /// Thread table is full
    TooManyThreads,
}

impl PollError {
    /// Negative status code equivalent of this error.
    pub fn errno(self) -> i32 {
        match self {
            PollError::TimedOut => -errno::EAGAIN,
            PollError::AddressInUse => -errno::EADDRINUSE,
        }
    }
}

impl SemError {
    /// Negative status code equivalent of this error.
    pub fn errno(self) -> i32 {
        match self {
            SemError::Busy => -errno::EBUSY,
            SemError::TimedOut => -errno::EAGAIN,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Poll(e) => write!(f, "Poll error: {}", e),
            KernelError::Sem(e) => write!(f, "Semaphore error: {}", e),
            KernelError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
        }
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::TimedOut => write!(f, "No event became ready before the timeout"),
            PollError::AddressInUse => write!(f, "Watched object already has a poller"),
        }
    }
}

impl fmt::Display for SemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemError::Busy => write!(f, "Semaphore unavailable"),
            SemError::TimedOut => write!(f, "Semaphore take timed out"),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotStarted => write!(f, "Kernel not started"),
            SpawnError::AlreadyStarted => write!(f, "Kernel already started"),
            SpawnError::InvalidPriority(prio) => write!(f, "Invalid priority: {}", prio),
            SpawnError::TooManyThreads => write!(f, "Maximum number of threads reached"),
        }
    }
}

// Conversion implementations for ergonomic error handling

impl From<PollError> for KernelError {
    fn from(error: PollError) -> Self {
        KernelError::Poll(error)
    }
}

impl From<SemError> for KernelError {
    fn from(error: SemError) -> Self {
        KernelError::Sem(error)
    }
}

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

/// Report a broken kernel contract and abort.
///
/// Used for preconditions whose violation would otherwise corrupt wait-queue
/// or poller state: swapping from interrupt context, a thread pended twice,
/// an empty bulk insert, an unsupported poll mode.
#[cold]
#[track_caller]
pub(crate) fn contract_violation(args: fmt::Arguments<'_>) -> ! {
    log::error!("kernel contract violation: {}", args);
    panic!("kernel contract violation: {}", args)
}

/// Assert a kernel contract, aborting through [`contract_violation`].
macro_rules! kassert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::errors::contract_violation(format_args!($($arg)+))
        }
    };
}

pub(crate) use kassert;
