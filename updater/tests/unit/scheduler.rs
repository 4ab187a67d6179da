//! Scheduler jobs on a paused clock.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use agent_updater::scheduler::{JobControl, JobEnd, JobEvent, JobId, Scheduler};

async fn wait_for(events: &mut broadcast::Receiver<JobEvent>, id: JobId) -> JobEvent {
    loop {
        let event = events.recv().await.expect("event");
        if event.id == id {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn run_now_completes_once() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let runs = Arc::new(AtomicUsize::new(0));

    let handle = scheduler.run_now("once", {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });

    let event = wait_for(&mut events, handle.id).await;
    assert_eq!(event.end, JobEnd::Completed);
    assert_eq!(event.name, "once");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(scheduler.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_after_waits_for_delay() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let started = Instant::now();

    let handle = scheduler.run_after("later", Duration::from_secs(3600), async {});
    assert_eq!(scheduler.pending(), [handle.clone()]);

    wait_for(&mut events, handle.id).await;
    assert!(started.elapsed() >= Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn run_at_in_the_past_runs_immediately() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let started = Instant::now();

    let handle = scheduler.run_at("overdue", started, async {});

    wait_for(&mut events, handle.id).await;
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn delayed_jobs_run_in_time_order() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    for (name, secs) in [("third", 30), ("first", 10), ("second", 20)] {
        let order = Arc::clone(&order);
        scheduler.run_after(name, Duration::from_secs(secs), async move {
            order.lock().expect("lock").push(name);
        });
    }
    for _ in 0..3 {
        events.recv().await.expect("event");
    }

    assert_eq!(*order.lock().expect("lock"), ["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn periodic_job_waits_a_period_and_stops_itself() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let runs = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let handle = scheduler.run_every("retry", Duration::from_secs(120), {
        let runs = Arc::clone(&runs);
        move || {
            let runs = Arc::clone(&runs);
            async move {
                if runs.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    JobControl::Stop
                } else {
                    JobControl::Continue
                }
            }
        }
    });

    let event = wait_for(&mut events, handle.id).await;
    assert_eq!(event.end, JobEnd::Stopped);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(360));
    assert!(scheduler.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_emits_one_cancelled_event() {
    let scheduler = Scheduler::new();
    let mut events = scheduler.subscribe();
    let handle = scheduler.run_after("doomed", Duration::from_secs(60), async {});

    assert!(scheduler.cancel(handle.id));
    assert!(!scheduler.cancel(handle.id), "second cancel is a no-op");

    let event = wait_for(&mut events, handle.id).await;
    assert_eq!(event.end, JobEnd::Cancelled);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(events.try_recv().is_err(), "no further event for the job");
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_everything() {
    let scheduler = Scheduler::new();
    let ran = Arc::new(AtomicUsize::new(0));
    for name in ["a", "b"] {
        let ran = Arc::clone(&ran);
        scheduler.run_after(name, Duration::from_secs(10), async move {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }
    scheduler.run_every("tick", Duration::from_secs(1), || async { JobControl::Continue });
    assert_eq!(scheduler.pending().len(), 3);

    scheduler.shutdown();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(scheduler.pending().is_empty());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
