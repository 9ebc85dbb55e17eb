//! End-to-end tests for TickScheduler on the system clock
//! These tests run the real clock and tokio timers, either on paused virtual time or, for the
//! multi-threaded cases, on real time with loose bounds.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{EventKind, PendingWake, TickScheduler, TimerConfig, TimerEvent, TimerState};

fn create_integration_timer(interval_ms: u64) -> TickScheduler {
    TickScheduler::new(TimerConfig { interval_ms, precision: true })
}

fn tick_log(timer: &TickScheduler) -> Arc<Mutex<Vec<u64>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    timer.on(EventKind::Tick, move |event: &TimerEvent| {
        sink.lock().push(event.timer.tick_count());
        Ok(())
    });
    log
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
#[allow(clippy::module_inception)]
mod integration_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cadence_tracks_clock_over_long_run() {
        let timer = create_integration_timer(10);
        let log = tick_log(&timer);

        timer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1_005)).await;

        assert_eq!(timer.tick_count(), 100);
        assert_eq!(*log.lock(), (1..=100).collect::<Vec<_>>());
        assert_eq!(timer.metrics().max_lateness_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_up_on_virtual_time() {
        let timer = create_integration_timer(100);
        timer.start().unwrap();

        // one jump of 350ms: the first wake-up is delivered 250ms late
        tokio::time::advance(Duration::from_millis(350)).await;
        settle().await;

        assert_eq!(timer.tick_count(), 3);
        assert_eq!(timer.pending_wake(), PendingWake::Delayed);
        assert_eq!(timer.metrics().immediate_wakes, 2);

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(timer.tick_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_event_order() {
        let timer = create_integration_timer(50);
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Start, EventKind::Tick, EventKind::Stop, EventKind::Reset] {
            let events = events.clone();
            timer.on(kind, move |event: &TimerEvent| {
                events.lock().push(event.name);
                Ok(())
            });
        }

        timer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        timer.stop().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        timer.reset().unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                EventKind::Start,
                EventKind::Tick,
                EventKind::Tick,
                EventKind::Stop,
                EventKind::Reset
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_elapsed_while_running() {
        let timer = TickScheduler::builder().interval(20).build();
        timer.start().unwrap();

        let time = timer.time();
        assert!(time.started > 0);
        assert_eq!(time.stopped, 0);

        timer.stop().unwrap();
        let time = timer.time();
        assert!(time.stopped >= time.started);
        assert_eq!(time.elapsed, time.stopped - time.started);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_real_time_ticks_are_ordered() {
        let timer = create_integration_timer(5);
        let log = tick_log(&timer);

        timer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        timer.stop().unwrap();

        let delivered = log.lock().clone();
        assert!(delivered.len() >= 5, "only {} ticks delivered", delivered.len());
        assert_eq!(delivered, (1..=delivered.len() as u64).collect::<Vec<_>>());

        // nothing is delivered after stop returns
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(log.lock().len(), delivered.len());
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_from_another_thread() {
        let timer = create_integration_timer(2);
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Tick, EventKind::Stop] {
            let events = events.clone();
            timer.on(kind, move |event: &TimerEvent| {
                events.lock().push(event.name);
                Ok(())
            });
        }

        timer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let remote = timer.clone();
        std::thread::spawn(move || {
            remote.stop().unwrap();
        })
        .join()
        .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let events = events.lock();
        assert_eq!(events.last(), Some(&EventKind::Stop));
        assert_eq!(events.iter().filter(|kind| **kind == EventKind::Stop).count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_runtime_handle() {
        let runtime = tokio::runtime::Handle::current();
        let timer = TickScheduler::builder().interval(1).runtime(runtime).build();

        timer.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        timer.stop().unwrap();

        assert!(timer.tick_count() > 0);
        assert_eq!(timer.halted(), None);
    }
}
