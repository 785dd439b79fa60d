//! Background ingest queue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use libris_core::{DocumentId, UserId};

use crate::cancel::CancelSignal;
use crate::context::PipelineContext;
use crate::engine::{ExecutionReport, Pipeline};

/// One queued ingest run.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub original_filename: String,
    pub file_path: PathBuf,
    /// MIME type detected by the gate
    pub mime_type: String,
    /// Optional uploader-supplied description
    pub description: Option<String>,
}

/// Ingest lifecycle events, broadcast to observers.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Queued { document_id: DocumentId },
    Started { document_id: DocumentId },
    Finished { report: ExecutionReport },
}

/// Queue sizing.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Worker tasks draining the queue
    pub workers: usize,
    /// Bounded channel capacity
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(2),
            capacity: 256,
        }
    }
}

/// Submission handle, cheap to clone into the upload gate.
///
/// Holds only a weak reference to the queue channel, so outstanding handles
/// never keep a shut-down queue alive.
#[derive(Clone)]
pub struct IngestSender {
    tx: mpsc::WeakSender<IngestJob>,
    events: broadcast::Sender<IngestEvent>,
}

impl IngestSender {
    /// Enqueue a job. Returns whether the queue accepted it.
    pub async fn submit(&self, job: IngestJob) -> bool {
        let document_id = job.document_id;
        let Some(tx) = self.tx.upgrade() else {
            warn!(document_id = %document_id, "ingest queue is closed, job dropped");
            return false;
        };
        match tx.send(job).await {
            Ok(()) => {
                let _ = self.events.send(IngestEvent::Queued { document_id });
                true
            }
            Err(_) => {
                warn!(document_id = %document_id, "ingest queue is closed, job dropped");
                false
            }
        }
    }
}

/// Fixed pool of worker tasks running the ingest pipeline.
///
/// Workers share one receiver; each drains jobs until the channel closes.
/// Jobs for the same user are safe to run concurrently because every
/// per-document file is namespaced by document id.
pub struct IngestQueue {
    tx: mpsc::Sender<IngestJob>,
    events: broadcast::Sender<IngestEvent>,
    cancel: CancelSignal,
    workers: Vec<JoinHandle<()>>,
}

impl IngestQueue {
    /// Start the worker pool over a shared pipeline.
    #[must_use]
    pub fn start(pipeline: Arc<Pipeline>, config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel::<IngestJob>(config.capacity);
        let (events, _) = broadcast::channel(256);
        let rx = Arc::new(Mutex::new(rx));
        let cancel = CancelSignal::new();

        info!(workers = config.workers, "starting ingest workers");

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let pipeline = Arc::clone(&pipeline);
                let events = events.clone();
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };

                        debug!(
                            worker,
                            document_id = %job.document_id,
                            "picked up ingest job"
                        );
                        let _ = events.send(IngestEvent::Started {
                            document_id: job.document_id,
                        });

                        let mut context = PipelineContext::new(
                            job.document_id,
                            job.user_id,
                            job.original_filename,
                            job.file_path,
                        );
                        context
                            .attributes
                            .insert("mime_type".to_string(), job.mime_type);
                        if let Some(description) = job.description {
                            context
                                .attributes
                                .insert("description".to_string(), description);
                        }

                        let report = pipeline.execute(&mut context, &cancel).await;
                        let _ = events.send(IngestEvent::Finished { report });
                    }
                    debug!(worker, "ingest worker stopped");
                })
            })
            .collect();

        Self {
            tx,
            events,
            cancel,
            workers,
        }
    }

    /// Submission handle for the upload gate.
    #[must_use]
    pub fn sender(&self) -> IngestSender {
        IngestSender {
            tx: self.tx.downgrade(),
            events: self.events.clone(),
        }
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }

    /// The signal observed by running pipelines.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Stop accepting jobs, drain the queue, and join the workers.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("ingest queue drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PipelineStep, RunStatus};
    use async_trait::async_trait;
    use libris_core::Error;
    use std::time::Duration;

    struct MarkerStep;

    #[async_trait]
    impl PipelineStep for MarkerStep {
        fn name(&self) -> &str {
            "marker"
        }
        async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
            Ok(format!("processed {}", context.original_filename))
        }
    }

    fn job(name: &str) -> IngestJob {
        IngestJob {
            document_id: DocumentId::generate(),
            user_id: UserId::parse("u@x.io").unwrap(),
            original_filename: name.to_string(),
            file_path: PathBuf::from("/tmp/raw"),
            mime_type: "text/plain".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn jobs_run_and_emit_events() {
        let pipeline = Arc::new(Pipeline::new("test", vec![Box::new(MarkerStep)]));
        let queue = IngestQueue::start(pipeline, QueueConfig { workers: 2, capacity: 8 });
        let mut events = queue.subscribe();

        let submitted = job("a.txt");
        let document_id = submitted.document_id;
        assert!(queue.sender().submit(submitted).await);

        let mut saw_queued = false;
        let mut report = None;
        while report.is_none() {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event before timeout")
                .unwrap();
            match event {
                IngestEvent::Queued { document_id: id } => saw_queued = id == document_id,
                IngestEvent::Started { .. } => {}
                IngestEvent::Finished { report: r } => report = Some(r),
            }
        }

        assert!(saw_queued);
        let report = report.unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.document_id, document_id.to_string());

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_pending_jobs() {
        let pipeline = Arc::new(Pipeline::new("test", vec![Box::new(MarkerStep)]));
        let queue = IngestQueue::start(pipeline, QueueConfig { workers: 1, capacity: 8 });
        let mut events = queue.subscribe();

        for i in 0..4 {
            assert!(queue.sender().submit(job(&format!("{i}.txt"))).await);
        }
        queue.shutdown().await;

        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, IngestEvent::Finished { .. }) {
                finished += 1;
            }
        }
        assert_eq!(finished, 4);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let pipeline = Arc::new(Pipeline::new("test", vec![Box::new(MarkerStep)]));
        let queue = IngestQueue::start(pipeline, QueueConfig { workers: 1, capacity: 8 });
        let sender = queue.sender();
        queue.shutdown().await;

        assert!(!sender.submit(job("late.txt")).await);
    }
}
