//! Scenario tests that run real kernel threads on the hosted port.
//!
//! Each test boots its own leaked kernel with the test thread as main.
//! Kernel threads only record what they observe; the assertions run on the
//! main thread.

mod helpers;

mod poll;
mod sem;
