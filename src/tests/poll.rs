//! Poll: immediate readiness, blocking waits, single-poller enforcement.

#[cfg(test)]
mod poll_tests {
    use crate::errors::PollError;
    use crate::poll::{PollEvent, PollMode, PollSignal, PollState, PollType, Pollable};
    use crate::sync::{Fifo, Semaphore};
    use crate::tests::helpers::{boot, leak, Trace};
    use crate::thread::Priority;
    use crate::time::Timeout;
    use alloc::vec;

    struct Objects {
        sem: Semaphore,
        fifo: Fifo<u32>,
        signal: PollSignal,
    }

    impl Objects {
        fn new() -> Self {
            Self {
                sem: Semaphore::new(0, 1),
                fifo: Fifo::new(),
                signal: PollSignal::new(),
            }
        }

        fn events(&self) -> [PollEvent<'_>; 3] {
            [
                PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, &self.sem).with_tag(1),
                PollEvent::new(PollType::FifoDataAvailable, PollMode::NotifyOnly, &self.fifo)
                    .with_tag(2),
                PollEvent::new(PollType::Signal, PollMode::NotifyOnly, &self.signal).with_tag(3),
            ]
        }

        fn any_registered(&self) -> bool {
            self.sem.poller_slot().is_registered()
                || self.fifo.poller_slot().is_registered()
                || self.signal.poller_slot().is_registered()
        }
    }

    fn states(events: &[PollEvent<'_>]) -> vec::Vec<PollState> {
        events.iter().map(|event| event.state).collect()
    }

    #[test]
    fn test_immediately_ready_events() {
        let kernel = boot();
        let objects = Objects::new();
        objects.sem.give(kernel);
        objects.fifo.put(kernel, 7);
        objects.signal.raise(kernel, 0x1337);

        let mut events = objects.events();
        assert_eq!(kernel.poll(&mut events, Timeout::NoWait), Ok(()));
        assert_eq!(
            states(&events),
            vec![
                PollState::SemAvailable,
                PollState::FifoDataAvailable,
                PollState::Signaled
            ]
        );
        assert_eq!(events.iter().map(|e| e.tag).collect::<vec::Vec<_>>(), vec![1, 2, 3]);

        // Consume everything and clear the states before polling again.
        assert!(objects.sem.take(kernel, Timeout::NoWait).is_ok());
        assert_eq!(objects.fifo.get(kernel, Timeout::NoWait), Some(7));
        assert_eq!(objects.signal.check(kernel), (true, 0x1337));
        objects.signal.reset(kernel);
        assert!(!objects.signal.check(kernel).0);
        events.iter_mut().for_each(|event| event.reset());

        assert_eq!(kernel.poll(&mut events, Timeout::NoWait), Err(PollError::TimedOut));
        assert_eq!(states(&events), vec![PollState::NotReady; 3]);
        assert!(!objects.any_registered());
    }

    #[test]
    fn test_poll_times_out_and_unregisters() {
        let kernel = boot();
        let objects = Objects::new();
        let mut events = objects.events();

        assert_eq!(kernel.poll(&mut events, Timeout::ticks(5)), Err(PollError::TimedOut));
        assert_eq!(kernel.uptime_ticks(), 5);
        assert_eq!(states(&events), vec![PollState::NotReady; 3]);
        assert!(!objects.any_registered());
    }

    #[test]
    fn test_poller_woken_by_higher_priority_producer() {
        let kernel = boot();
        let objects = leak(Objects::new());
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("producer"), Priority::new(5), move || {
                // Give the poller time to block.
                kernel.sleep(Timeout::ticks(1));
                objects.sem.give(kernel);
                objects.fifo.put(kernel, 3);
                objects.signal.raise(kernel, 1);
                t.push("produced");
            })
            .unwrap();

        let mut events = objects.events();
        let timeout = kernel.timeout(crate::time::Duration::from_secs(1));
        assert_eq!(kernel.poll(&mut events, timeout), Ok(()));

        assert_eq!(trace.take(), vec!["produced"]);
        assert_eq!(
            states(&events),
            vec![
                PollState::SemAvailable,
                PollState::FifoDataAvailable,
                PollState::Signaled
            ]
        );
        assert_eq!(events.iter().map(|e| e.tag).collect::<vec::Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(kernel.uptime_ticks(), 1);
        assert!(!objects.any_registered());
        assert_eq!(objects.signal.check(kernel), (true, 1));

        // Drain, reset, and wait again: nothing arrives this time.
        assert!(objects.sem.take(kernel, Timeout::NoWait).is_ok());
        assert_eq!(objects.fifo.get(kernel, Timeout::NoWait), Some(3));
        objects.signal.reset(kernel);
        events.iter_mut().for_each(|event| event.reset());

        assert_eq!(kernel.poll(&mut events, Timeout::ticks(1)), Err(PollError::TimedOut));
        assert_eq!(states(&events), vec![PollState::NotReady; 3]);
        assert_eq!(events.iter().map(|e| e.tag).collect::<vec::Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(kernel.uptime_ticks(), 2);
        assert!(!objects.any_registered());
    }

    #[test]
    fn test_bulk_put_wakes_poller() {
        let kernel = boot();
        let fifo: &'static Fifo<u32> = leak(Fifo::new());
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("poller"), Priority::new(5), move || {
                let mut events =
                    [PollEvent::new(PollType::FifoDataAvailable, PollMode::NotifyOnly, fifo)];
                let result = kernel.poll(&mut events, Timeout::Forever);
                t.push((result, events[0].state, fifo.len(kernel)));
            })
            .unwrap();
        assert!(fifo.poller_slot().is_registered());

        fifo.put_list(kernel, [1, 2]);
        // The poller ran before the bulk put returned here.
        assert_eq!(trace.take(), vec![(Ok(()), PollState::FifoDataAvailable, 2)]);
        assert!(!fifo.poller_slot().is_registered());
        assert_eq!(fifo.get(kernel, Timeout::NoWait), Some(1));
        assert_eq!(fifo.get(kernel, Timeout::NoWait), Some(2));
    }

    #[test]
    fn test_events_become_ready_one_at_a_time() {
        let kernel = boot();
        let objects = leak(Objects::new());
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("producer"), Priority::new(12), move || {
                objects.signal.raise(kernel, 5);
                t.push("raised");
                objects.sem.give(kernel);
                t.push("given");
            })
            .unwrap();

        let mut events = [
            PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, &objects.sem),
            PollEvent::new(PollType::Signal, PollMode::NotifyOnly, &objects.signal),
        ];

        // The producer is less urgent, so the raise switches straight back here.
        assert_eq!(kernel.poll(&mut events, Timeout::Forever), Ok(()));
        trace.push("woke on signal");
        assert_eq!(states(&events), vec![PollState::NotReady, PollState::Signaled]);

        objects.signal.reset(kernel);
        events.iter_mut().for_each(|event| event.reset());
        assert_eq!(kernel.poll(&mut events, Timeout::Forever), Ok(()));
        trace.push("woke on sem");
        assert_eq!(states(&events), vec![PollState::SemAvailable, PollState::NotReady]);

        assert_eq!(trace.take(), vec!["woke on signal", "raised", "woke on sem"]);
    }

    #[test]
    fn test_second_poller_gets_address_in_use() {
        let kernel = boot();
        let sem = leak(Semaphore::new(0, 1));
        let trace = Trace::new();

        let t = trace.clone();
        kernel
            .spawn(Some("first poller"), Priority::new(5), move || {
                let mut events = [PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, sem)];
                let result = kernel.poll(&mut events, Timeout::Forever);
                let taken = sem.take(kernel, Timeout::NoWait);
                t.push((result, events[0].state, taken.is_ok()));
            })
            .unwrap();
        assert!(sem.poller_slot().is_registered());

        let mut events = [PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, sem)];
        assert_eq!(
            kernel.poll(&mut events, Timeout::ticks(10)),
            Err(PollError::AddressInUse)
        );
        assert_eq!(events[0].state, PollState::AddressInUse);
        assert_eq!(kernel.uptime_ticks(), 0);

        // The first registration survived: giving wakes the first poller.
        sem.give(kernel);
        assert_eq!(
            trace.take(),
            vec![(Ok(()), PollState::SemAvailable, true)]
        );
        assert_eq!(sem.count(kernel), 0);
        assert!(!sem.poller_slot().is_registered());
    }

    #[test]
    fn test_same_object_twice_in_one_call() {
        let kernel = boot();
        let objects = Objects::new();
        let mut events = [
            PollEvent::new(PollType::Signal, PollMode::NotifyOnly, &objects.signal),
            PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, &objects.sem),
            PollEvent::new(PollType::Signal, PollMode::NotifyOnly, &objects.signal),
        ];

        assert_eq!(
            kernel.poll(&mut events, Timeout::Forever),
            Err(PollError::AddressInUse)
        );
        assert_eq!(
            states(&events),
            vec![PollState::NotReady, PollState::NotReady, PollState::AddressInUse]
        );
        assert!(!objects.any_registered());
    }

    #[test]
    fn test_signal_raised_from_interrupt() {
        let kernel = boot();
        let signal = leak(PollSignal::new());

        kernel
            .spawn(Some("irq source"), Priority::new(12), move || {
                kernel.irq_context(|| signal.raise(kernel, -3));
            })
            .unwrap();

        let mut events = [PollEvent::new(PollType::Signal, PollMode::NotifyOnly, signal)];
        assert_eq!(kernel.poll(&mut events, Timeout::Forever), Ok(()));
        assert_eq!(events[0].state, PollState::Signaled);
        assert_eq!(signal.check(kernel), (true, -3));
    }

    #[test]
    #[should_panic(expected = "no events")]
    fn test_empty_poll_is_fatal() {
        let kernel = boot();
        kernel.poll(&mut [], Timeout::NoWait).ok();
    }

    #[test]
    #[should_panic(expected = "interrupt context")]
    fn test_blocking_poll_in_interrupt_is_fatal() {
        let kernel = boot();
        let sem = Semaphore::new(0, 1);
        kernel.irq_context(|| {
            let mut events = [PollEvent::new(PollType::SemAvailable, PollMode::NotifyOnly, &sem)];
            kernel.poll(&mut events, Timeout::Forever).ok();
        });
    }
}
