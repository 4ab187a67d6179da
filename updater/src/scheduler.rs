//! In-process job scheduler.
//!
//! Jobs are tokio tasks tracked by id. One-shot jobs run now or after a
//! delay; periodic jobs wait one full period before their first run and stop
//! when their body returns [`JobControl::Stop`]. Every job end is published
//! exactly once on a broadcast channel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub type JobId = u64;

/// Returned by each run of a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEnd {
    /// A one-shot job ran to completion.
    Completed,
    /// A periodic job returned [`JobControl::Stop`].
    Stopped,
    /// Removed by [`Scheduler::cancel`] or [`Scheduler::shutdown`].
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub id: JobId,
    pub name: String,
    pub end: JobEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub name: String,
}

struct Entry {
    name: String,
    task: AbortHandle,
}

struct Inner {
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, Entry>>,
    events: broadcast::Sender<JobEvent>,
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, id: JobId, end: JobEnd) {
        let Some(entry) = self.jobs().remove(&id) else {
            return;
        };
        tracing::debug!(job = %entry.name, id, ?end, "job finished");
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            id,
            name: entry.name,
            end,
        });
    }
}

/// Cheap to clone; clones share the same job table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                jobs: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Run `job` immediately.
    pub fn run_now<F>(&self, name: &str, job: F) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, async move {
            job.await;
            JobEnd::Completed
        })
    }

    /// Run `job` once, `delay` from now.
    pub fn run_after<F>(&self, name: &str, delay: Duration, job: F) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.run_at(name, Instant::now() + delay, job)
    }

    /// Run `job` once at `when`, or immediately if `when` has passed.
    pub fn run_at<F>(&self, name: &str, when: Instant, job: F) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, async move {
            tokio::time::sleep_until(when).await;
            job.await;
            JobEnd::Completed
        })
    }

    /// Run `make_job()` every `period`, first after one full period.
    ///
    /// Runs never overlap; a slow run delays the next tick.
    pub fn run_every<F, Fut>(&self, name: &str, period: Duration, mut make_job: F) -> JobHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = JobControl> + Send + 'static,
    {
        self.spawn(name, async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if make_job().await == JobControl::Stop {
                    return JobEnd::Stopped;
                }
            }
        })
    }

    /// Abort a job. Returns `false` if it already ended.
    pub fn cancel(&self, id: JobId) -> bool {
        let Some(entry) = self.inner.jobs().remove(&id) else {
            return false;
        };
        entry.task.abort();
        tracing::debug!(job = %entry.name, id, "job cancelled");
        let _ = self.inner.events.send(JobEvent {
            id,
            name: entry.name,
            end: JobEnd::Cancelled,
        });
        true
    }

    /// Jobs that have not ended, ordered by id.
    #[must_use]
    pub fn pending(&self) -> Vec<JobHandle> {
        let mut jobs: Vec<JobHandle> = self
            .inner
            .jobs()
            .iter()
            .map(|(id, entry)| JobHandle {
                id: *id,
                name: entry.name.clone(),
            })
            .collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Cancel every pending job.
    pub fn shutdown(&self) {
        for job in self.pending() {
            self.cancel(job.id);
        }
    }

    fn spawn<F>(&self, name: &str, body: F) -> JobHandle
    where
        F: Future<Output = JobEnd> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        // Hold the table while spawning so `finish` cannot run before the
        // entry exists.
        let mut jobs = self.inner.jobs();
        let task = tokio::spawn(async move {
            let end = body.await;
            inner.finish(id, end);
        });
        jobs.insert(
            id,
            Entry {
                name: name.to_string(),
                task: task.abort_handle(),
            },
        );
        drop(jobs);
        tracing::debug!(job = name, id, "job scheduled");
        JobHandle {
            id,
            name: name.to_string(),
        }
    }
}
