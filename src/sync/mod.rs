//! Kernel objects threads block on: the dynamic FIFO and the counting
//! semaphore, plus the index-linked list the FIFO stores data in.

pub mod fifo;
pub mod semaphore;
pub mod slist;

pub use fifo::Fifo;
pub use semaphore::Semaphore;
pub use slist::SList;
