use super::{Priority, ThreadId};
use crate::arch::Port;
use crate::errors::SpawnError;
use crate::kernel::Kernel;

/// Builder front-end for [`Kernel::spawn`].
pub struct ThreadBuilder {
    priority: Priority,
    name: Option<&'static str>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self {
            priority: Priority::PREEMPT_HIGHEST,
            name: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn spawn<P, F>(self, kernel: &'static Kernel<P>, f: F) -> Result<ThreadId, SpawnError>
    where
        P: Port,
        F: FnOnce() + Send + 'static,
    {
        kernel.spawn(self.name, self.priority, f)
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
