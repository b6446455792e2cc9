#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Synchronization core for a small preemptive real-time kernel.
//!
//! This library provides the blocking primitives of a single-core RTOS
//! kernel: priority-ordered wait queues, a dynamic FIFO, a counting
//! semaphore, poll signals, and a poll call that waits on several of them at
//! once. All of it is built on one locking protocol: mask interrupts, mutate
//! scheduler state, then either restore interrupts or swap to another thread
//! with the restore folded into the switch.
//!
//! # Features
//!
//! - `std-shim`: Enable the hosted port, which backs kernel threads with std
//!   threads and runs on virtual time
//!
//! # Quick Start
//!
//! ```ignore
//! use preemptive_sync::{Fifo, HostPort, Kernel, KernelConfig, Priority, Timeout};
//! use spin::Lazy;
//!
//! static KERNEL: Lazy<Kernel<HostPort>> =
//!     Lazy::new(|| Kernel::new(HostPort::new(), KernelConfig::new()));
//! static QUEUE: Lazy<Fifo<u32>> = Lazy::new(Fifo::new);
//!
//! fn kernel_main() {
//!     KERNEL.start().expect("Failed to start kernel");
//!
//!     KERNEL.spawn(Some("consumer"), Priority::new(5), || {
//!         while let Some(item) = QUEUE.get(&*KERNEL, Timeout::Forever) {
//!             log::info!("got {}", item);
//!         }
//!     }).expect("Failed to spawn thread");
//!
//!     QUEUE.put(&*KERNEL, 1);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`arch`]: the port trait (interrupt lock and context switch)
//! - [`kernel`]: scheduler context, lock guard, swap, thread lifecycle
//! - [`sync`]: FIFO, semaphore and the list the FIFO stores data in
//! - [`poll`]: poll events, poll signals, and [`Kernel::poll`]

// Core modules
pub mod arch;
pub mod config;
pub mod errors;
pub mod kernel;
pub mod poll;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
mod tests;

#[cfg(test)]
extern crate std;

extern crate alloc;

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{IrqKey, Port};

#[cfg(any(test, feature = "std-shim"))]
pub use arch::HostPort;

// Kernel
pub use config::KernelConfig;
pub use kernel::Kernel;

// Threads
pub use thread::{Priority, ThreadBuilder, ThreadId, ThreadState};

// Kernel objects
pub use poll::{PollEvent, PollMode, PollSignal, PollState, PollType, Pollable};
pub use sync::{Fifo, SList, Semaphore};

// Time
pub use time::{Duration, Timeout};

// Errors
pub use errors::{KernelError, KernelResult, PollError, SemError, SpawnError};
