//! Bounded FIFO admission of background jobs.
//!
//! At most `ceiling` jobs are active at once. A job is admitted when it is
//! enqueued or whenever an active job leaves the active set, which happens
//! on completion or cancellation. The queue itself never waits for anything.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use videoinsight_common::{JobId, JobKind, JobState};

/// Identity of a job for deduplication: one job per file and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub path: PathBuf,
    pub kind: JobKind,
}

impl JobKey {
    pub fn new(path: impl Into<PathBuf>, kind: JobKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Handles returned by a [`JobStarter`] for an admitted job.
#[derive(Debug)]
pub struct JobControl {
    pub cancel: CancellationToken,
    pub worker: Option<JoinHandle<()>>,
}

/// Starts the work for an admitted job.
pub trait JobStarter {
    fn start(&mut self, id: JobId, key: &JobKey) -> JobControl;
}

/// What [`WorkQueue::cancel`] did.
#[derive(Debug)]
pub enum Cancelled {
    NotFound,
    /// Removed before it ever started.
    Dequeued,
    /// Signalled to stop. The worker, if any, should be awaited briefly.
    Stopped(Option<JoinHandle<()>>),
}

#[derive(Debug)]
struct QueuedJob {
    id: JobId,
    key: JobKey,
}

#[derive(Debug)]
struct ActiveJob {
    key: JobKey,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

pub struct WorkQueue<S> {
    starter: S,
    ceiling: usize,
    pending: VecDeque<QueuedJob>,
    active: HashMap<JobId, ActiveJob>,
}

impl<S: JobStarter> WorkQueue<S> {
    pub const DEFAULT_CEILING: usize = 3;

    /// A ceiling of zero is raised to one.
    pub fn new(starter: S, ceiling: usize) -> Self {
        Self {
            starter,
            ceiling: ceiling.max(1),
            pending: VecDeque::new(),
            active: HashMap::new(),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.pending.is_empty()
    }

    pub fn starter(&self) -> &S {
        &self.starter
    }

    pub fn state_of(&self, key: &JobKey) -> Option<JobState> {
        if self.active.values().any(|a| &a.key == key) {
            Some(JobState::Active)
        } else if self.pending.iter().any(|q| &q.key == key) {
            Some(JobState::Queued)
        } else {
            None
        }
    }

    /// Key of a currently active job.
    pub fn active_key(&self, id: JobId) -> Option<&JobKey> {
        self.active.get(&id).map(|a| &a.key)
    }

    /// Append a job and admit what fits. Returns `None` if a job with the
    /// same key is already pending or active.
    pub fn enqueue(&mut self, path: impl Into<PathBuf>, kind: JobKind) -> Option<JobId> {
        let key = JobKey::new(path, kind);
        if self.state_of(&key).is_some() {
            trace!(path = %key.path.display(), kind = %key.kind, "Job already queued");
            return None;
        }

        let id = JobId::new();
        debug!(job_id = %id, path = %key.path.display(), kind = %key.kind, "Job queued");
        self.pending.push_back(QueuedJob { id, key });
        self.admit();
        Some(id)
    }

    fn admit(&mut self) {
        while self.active.len() < self.ceiling {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            let control = self.starter.start(job.id, &job.key);
            debug!(job_id = %job.id, path = %job.key.path.display(), kind = %job.key.kind, "Job started");
            self.active.insert(
                job.id,
                ActiveJob {
                    key: job.key,
                    cancel: control.cancel,
                    worker: control.worker,
                },
            );
        }
    }

    /// Mark an active job finished and admit the next ones.
    ///
    /// Ids that are not active, such as those of jobs already cancelled,
    /// are ignored and return `false`.
    pub fn complete(&mut self, id: JobId) -> bool {
        if self.active.remove(&id).is_none() {
            trace!(job_id = %id, "Ignoring stale job id");
            return false;
        }
        self.admit();
        true
    }

    pub fn cancel(&mut self, key: &JobKey) -> Cancelled {
        if let Some(pos) = self.pending.iter().position(|q| &q.key == key) {
            self.pending.remove(pos);
            debug!(path = %key.path.display(), kind = %key.kind, "Dequeued job");
            return Cancelled::Dequeued;
        }

        let Some(id) = self
            .active
            .iter()
            .find(|(_, a)| &a.key == key)
            .map(|(id, _)| *id)
        else {
            return Cancelled::NotFound;
        };

        let Some(job) = self.active.remove(&id) else {
            return Cancelled::NotFound;
        };
        job.cancel.cancel();
        debug!(job_id = %id, path = %key.path.display(), kind = %key.kind, "Cancelled active job");
        self.admit();
        Cancelled::Stopped(job.worker)
    }

    /// Cancel both kinds of job for `path`. Returns workers to await.
    pub fn cancel_path(&mut self, path: &Path) -> Vec<JoinHandle<()>> {
        JobKind::ALL
            .into_iter()
            .filter_map(|kind| match self.cancel(&JobKey::new(path, kind)) {
                Cancelled::Stopped(worker) => worker,
                _ => None,
            })
            .collect()
    }

    /// Drop every pending job and stop every active one.
    pub fn cancel_all(&mut self) -> Vec<JoinHandle<()>> {
        self.pending.clear();
        self.active
            .drain()
            .filter_map(|(_, job)| {
                job.cancel.cancel();
                job.worker
            })
            .collect()
    }
}

/// Wait up to `grace` in total for the cancelled workers to finish. Returns
/// how many did not finish in time; those are left detached.
pub async fn drain_workers(workers: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    let mut late = 0;
    for worker in workers {
        if tokio::time::timeout_at(deadline, worker).await.is_err() {
            late += 1;
        }
    }
    if late > 0 {
        warn!(late, grace_ms = grace.as_millis() as u64, "Cancelled jobs did not stop in time");
    }
    late
}
