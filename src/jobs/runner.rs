//! Runs admitted jobs as tokio tasks and reports back over a channel.
//!
//! Workers only compute. Every result goes to the control task as a
//! [`JobEvent`], which owns all state and frees the queue slot.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use videoinsight_av::{ProbeReport, Prober, Thumbnail, ThumbnailExtractor};
use videoinsight_common::{JobId, JobKind};

use super::queue::{JobControl, JobKey, JobStarter};

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Probed(Box<ProbeReport>),
    Thumbnail(Thumbnail),
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub id: JobId,
    pub key: JobKey,
    pub outcome: JobOutcome,
}

struct JobTools {
    prober: Prober,
    thumbnails: ThumbnailExtractor,
}

/// Spawns one tokio task per admitted job. Must be used inside a runtime.
pub struct TokioStarter {
    tools: Arc<JobTools>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl TokioStarter {
    pub fn new(
        prober: Prober,
        thumbnails: ThumbnailExtractor,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let starter = Self {
            tools: Arc::new(JobTools { prober, thumbnails }),
            events,
        };
        (starter, receiver)
    }
}

impl JobStarter for TokioStarter {
    fn start(&mut self, id: JobId, key: &JobKey) -> JobControl {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tools = Arc::clone(&self.tools);
        let events = self.events.clone();
        let key = key.clone();

        let worker = tokio::spawn(async move {
            let outcome = run_job(&tools, &key, &token).await;
            debug!(job_id = %id, path = %key.path.display(), kind = %key.kind, outcome = outcome_label(&outcome), "Job finished");
            // The receiver is gone only during shutdown.
            let _ = events.send(JobEvent { id, key, outcome });
        });

        JobControl {
            cancel,
            worker: Some(worker),
        }
    }
}

async fn run_job(tools: &JobTools, key: &JobKey, token: &CancellationToken) -> JobOutcome {
    let result = match key.kind {
        JobKind::Probe => tools
            .prober
            .probe(&key.path, Some(token))
            .await
            .map(|report| JobOutcome::Probed(Box::new(report))),
        JobKind::Thumbnail => tools
            .thumbnails
            .extract(&key.path, Some(token))
            .await
            .map(JobOutcome::Thumbnail),
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() || token.is_cancelled() => JobOutcome::Cancelled,
        Err(e) => JobOutcome::Failed(e.to_string()),
    }
}

fn outcome_label(outcome: &JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Probed(_) => "probed",
        JobOutcome::Thumbnail(_) => "thumbnail",
        JobOutcome::Failed(_) => "failed",
        JobOutcome::Cancelled => "cancelled",
    }
}
