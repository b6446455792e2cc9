//! Counting semaphore under contention.

#[cfg(test)]
mod sem_tests {
    use crate::errors::SemError;
    use crate::sync::Semaphore;
    use crate::tests::helpers::{boot, leak, Trace};
    use crate::thread::Priority;
    use crate::time::Timeout;
    use alloc::vec;

    #[test]
    fn test_give_wakes_waiter_without_counting() {
        let kernel = boot();
        let sem = leak(Semaphore::new(0, 1));
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("taker"), Priority::new(5), move || {
                t.push(sem.take(kernel, Timeout::Forever));
            })
            .unwrap();

        sem.give(kernel);
        assert_eq!(trace.take(), vec![Ok(())]);
        assert_eq!(sem.count(kernel), 0);
    }

    #[test]
    fn test_take_times_out() {
        let kernel = boot();
        let sem = Semaphore::new(0, 1);

        assert_eq!(sem.take(kernel, Timeout::NoWait), Err(SemError::Busy));
        assert_eq!(sem.take(kernel, Timeout::ticks(3)), Err(SemError::TimedOut));
        assert_eq!(kernel.uptime_ticks(), 3);
    }

    #[test]
    fn test_most_urgent_waiter_first() {
        let kernel = boot();
        let sem = leak(Semaphore::new(0, 3));
        let trace = Trace::new();

        for prio in [6, 2, 4] {
            let t = trace.clone();
            kernel
                .spawn(None, Priority::new(prio), move || {
                    if sem.take(kernel, Timeout::Forever).is_ok() {
                        t.push(prio);
                    }
                })
                .unwrap();
        }

        for _ in 0..3 {
            sem.give(kernel);
        }
        assert_eq!(trace.take(), vec![2, 4, 6]);
    }

    #[test]
    fn test_give_from_interrupt_to_lower_priority_waiter() {
        let kernel = boot();
        let sem = leak(Semaphore::new(0, 1));
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("background"), Priority::new(12), move || {
                if sem.take(kernel, Timeout::Forever).is_ok() {
                    t.push("background");
                }
            })
            .unwrap();
        // Let the background thread block first.
        kernel.sleep(Timeout::ticks(1));

        kernel.irq_context(|| sem.give(kernel));
        trace.push("main");
        kernel.sleep(Timeout::ticks(1));

        assert_eq!(trace.take(), vec!["main", "background"]);
    }
}
