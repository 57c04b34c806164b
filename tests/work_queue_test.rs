//! Work queue admission, ordering, deduplication, and cancellation.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio_util::sync::CancellationToken;
use videoinsight::jobs::{Cancelled, JobControl, JobKey, JobStarter, WorkQueue};
use videoinsight_common::{JobId, JobKind, JobState};

#[derive(Default)]
struct RecordingStarter {
    started: Vec<(JobId, PathBuf)>,
}

impl JobStarter for RecordingStarter {
    fn start(&mut self, id: JobId, key: &JobKey) -> JobControl {
        self.started.push((id, key.path.clone()));
        JobControl {
            cancel: CancellationToken::new(),
            worker: None,
        }
    }
}

fn id_of(queue: &WorkQueue<RecordingStarter>, path: &str) -> JobId {
    queue
        .starter()
        .started
        .iter()
        .find(|(_, p)| p == &PathBuf::from(path))
        .map(|(id, _)| *id)
        .unwrap()
}

fn started(queue: &WorkQueue<RecordingStarter>) -> Vec<String> {
    queue
        .starter()
        .started
        .iter()
        .map(|(_, p)| p.display().to_string())
        .collect()
}

#[test]
fn ceiling_holds_across_mixed_operations() {
    let mut queue = WorkQueue::new(RecordingStarter::default(), 3);
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for step in 0..500 {
        match next() % 4 {
            0 | 1 => {
                let file = format!("file{}", next() % 20);
                let kind = if next() % 2 == 0 { JobKind::Probe } else { JobKind::Thumbnail };
                queue.enqueue(file, kind);
            }
            2 => {
                if let Some((id, _)) = queue.starter().started.get((next() as usize) % (step + 1)) {
                    let id = *id;
                    queue.complete(id);
                }
            }
            _ => {
                let file = format!("file{}", next() % 20);
                queue.cancel(&JobKey::new(file, JobKind::Probe));
            }
        }
        assert!(queue.active_count() <= 3, "step {step}: {} active", queue.active_count());
    }
}

#[test]
fn ten_jobs_never_exceed_three_active() {
    let mut queue = WorkQueue::new(RecordingStarter::default(), 3);
    for i in 0..10 {
        queue.enqueue(format!("v{i}.mp4"), JobKind::Probe);
        assert!(queue.active_count() <= 3);
    }
    assert_eq!(queue.active_count(), 3);
    assert_eq!(queue.pending_count(), 7);

    for i in 0..10 {
        let id = id_of(&queue, &format!("v{i}.mp4"));
        assert!(queue.complete(id));
        assert!(queue.active_count() <= 3);
    }
    assert!(queue.is_idle());
}

#[test]
fn admission_is_fifo() {
    let mut queue = WorkQueue::new(RecordingStarter::default(), 2);
    for name in ["A", "B", "C", "D"] {
        queue.enqueue(name, JobKind::Probe);
    }
    assert_eq!(started(&queue), ["A", "B"]);

    queue.complete(id_of(&queue, "A"));
    assert_eq!(started(&queue), ["A", "B", "C"]);

    queue.complete(id_of(&queue, "B"));
    assert_eq!(started(&queue), ["A", "B", "C", "D"]);
}

#[test]
fn same_file_and_kind_is_tracked_once() {
    let mut queue = WorkQueue::new(RecordingStarter::default(), 1);
    assert!(queue.enqueue("active.mp4", JobKind::Probe).is_some());
    assert!(queue.enqueue("queued.mp4", JobKind::Probe).is_some());

    assert!(queue.enqueue("active.mp4", JobKind::Probe).is_none());
    assert!(queue.enqueue("queued.mp4", JobKind::Probe).is_none());
    assert_eq!(queue.active_count() + queue.pending_count(), 2);

    assert_eq!(
        queue.state_of(&JobKey::new("queued.mp4", JobKind::Probe)),
        Some(JobState::Queued)
    );
}

#[test]
fn cancelled_pending_job_never_starts() {
    let mut queue = WorkQueue::new(RecordingStarter::default(), 1);
    queue.enqueue("A", JobKind::Probe);
    queue.enqueue("B", JobKind::Probe);

    assert_matches!(queue.cancel(&JobKey::new("B", JobKind::Probe)), Cancelled::Dequeued);
    queue.complete(id_of(&queue, "A"));

    assert_eq!(started(&queue), ["A"]);
    assert!(queue.is_idle());
}

#[cfg(unix)]
mod with_processes {
    use super::common::write_script;
    use super::*;
    use std::time::Instant;
    use videoinsight::jobs::{drain_workers, JobOutcome, TokioStarter};
    use videoinsight_av::{Prober, ThumbnailExtractor};

    #[tokio::test]
    async fn cancelling_active_job_kills_the_tool_and_admits_next() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = dir.path().join("ffprobe");
        write_script(&ffprobe, "sleep 30");
        let clips: Vec<PathBuf> = ["one.mp4", "two.mp4"]
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                std::fs::write(&p, vec![1u8; 256]).unwrap();
                p
            })
            .collect();

        let (starter, mut events) =
            TokioStarter::new(Prober::new(&ffprobe), ThumbnailExtractor::new("ffmpeg"));
        let mut queue = WorkQueue::new(starter, 1);
        let first = queue.enqueue(&clips[0], JobKind::Probe).unwrap();
        queue.enqueue(&clips[1], JobKind::Probe).unwrap();

        let began = Instant::now();
        let worker = match queue.cancel(&JobKey::new(&clips[0], JobKind::Probe)) {
            Cancelled::Stopped(worker) => worker,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(queue.active_count(), 1);
        assert_eq!(
            queue.state_of(&JobKey::new(&clips[1], JobKind::Probe)),
            Some(JobState::Active)
        );

        let late = drain_workers(worker.into_iter().collect(), Duration::from_secs(5)).await;
        assert_eq!(late, 0);
        assert!(began.elapsed() < Duration::from_secs(10));

        let event = events.recv().await.unwrap();
        assert_eq!(event.id, first);
        assert_matches!(event.outcome, JobOutcome::Cancelled);
        assert!(!queue.complete(first));

        for worker in queue.cancel_all() {
            let _ = tokio::time::timeout(Duration::from_secs(5), worker).await;
        }
    }
}
