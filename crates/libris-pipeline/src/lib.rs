//! # libris-pipeline
//!
//! The ingest side of libris: a generic ordered-step engine, the four
//! concrete ingest steps, the streaming upload gate, and the background
//! worker queue.
//!
//! ```text
//! UploadGate ──enqueue──▶ IngestQueue ──worker──▶ Pipeline
//!                                                    │
//!                             Convert → Chunk → Embed → Persist
//! ```
//!
//! The engine ([`Pipeline`]) executes steps strictly in order, with per-step
//! retry budgets and exponential backoff, skip predicates, an external
//! [`CancelSignal`], and a soft per-run timeout. The first failing step
//! terminates the run; the outcome lands in an [`ExecutionReport`] — ingest
//! failures are never surfaced to the uploader, who already holds the
//! document id.
//!
//! The gate ([`UploadGate`]) streams bytes to disk under a size cap,
//! validates the user id and detected MIME type, and enqueues an
//! [`IngestJob`]. The queue ([`IngestQueue`]) drains jobs with a fixed pool
//! of workers and broadcasts lifecycle events.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod gate;
pub mod queue;
pub mod steps;

pub use cancel::CancelSignal;
pub use context::PipelineContext;
pub use engine::{
    ExecutionReport, Pipeline, PipelineStep, RunStatus, StepReport, StepResult, StepStatus,
};
pub use gate::{GateConfig, UploadGate};
pub use queue::{IngestEvent, IngestJob, IngestQueue, IngestSender, QueueConfig};
pub use steps::{ingest_pipeline, ChunkStep, ConvertStep, EmbedStep, IngestConfig, PersistStep};
