//! Generic ordered-step pipeline engine.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use libris_core::Error;

use crate::cancel::CancelSignal;
use crate::context::PipelineContext;

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not reached (earlier step failed or run was cut short)
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// Status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

/// Result of executing (or not executing) one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub message: String,
    pub error: Option<String>,
    /// Wall-clock time across all attempts, including backoff sleeps
    pub duration: Option<Duration>,
}

impl StepResult {
    #[must_use]
    pub fn success(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: StepStatus::Success,
            message: message.into(),
            error: None,
            duration: Some(duration),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: StepStatus::Failed,
            message: message.into(),
            error: Some(error.into()),
            duration: Some(duration),
        }
    }

    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            message: message.into(),
            error: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            message: String::new(),
            error: None,
            duration: None,
        }
    }
}

/// One step of a pipeline.
///
/// Steps are stateless: all per-run data flows through the
/// [`PipelineContext`]. A step may only add or overwrite context slots and
/// attributes; it must not touch another step's recorded result.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Stable step name, the key of its result entry.
    fn name(&self) -> &str;

    /// Retry budget after the first attempt.
    fn max_retries(&self) -> u32 {
        0
    }

    /// Whether to skip this step given the current context.
    fn should_skip(&self, _context: &PipelineContext) -> bool {
        false
    }

    /// Whether a failed attempt should be retried. `attempt` is the 0-based
    /// index of the attempt that just failed.
    fn should_retry(&self, attempt: u32, _error: &Error) -> bool {
        attempt < self.max_retries()
    }

    /// Run the step. Returns a human message on success.
    async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error>;
}

/// Per-step entry of an [`ExecutionReport`], in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub pipeline_name: String,
    pub status: RunStatus,
    pub document_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration: Duration,
    /// Step results in declared order; unexecuted steps are `Pending`
    pub steps: Vec<StepReport>,
    pub steps_completed: usize,
    pub steps_failed: usize,
}

/// Ordered-step executor with retry, skip, cancellation and timeout.
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn PipelineStep>>,
    soft_timeout: Duration,
}

enum StepFlow {
    Continue,
    Halt(RunStatus),
}

impl Pipeline {
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn PipelineStep>>) -> Self {
        Self {
            name: name.into(),
            steps,
            soft_timeout: Duration::from_secs(300),
        }
    }

    /// Replace the default 5-minute soft timeout.
    #[must_use]
    pub fn with_timeout(mut self, soft_timeout: Duration) -> Self {
        Self { soft_timeout, ..self }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute the pipeline against a context.
    ///
    /// The first failing step terminates the run; later steps are reported
    /// `Pending`. The cancel signal is observed between steps and between
    /// retries, and races in-flight step futures. The soft timeout bounds
    /// the whole run.
    pub async fn execute(
        &self,
        context: &mut PipelineContext,
        cancel: &CancelSignal,
    ) -> ExecutionReport {
        let started_at = Utc::now();
        let started = Instant::now();

        info!(
            pipeline = %self.name,
            document_id = %context.document_id,
            user = %context.user_id,
            "starting pipeline"
        );

        let status = match tokio::time::timeout(self.soft_timeout, self.run_steps(context, cancel))
            .await
        {
            Ok(status) => status,
            Err(_) => {
                error!(
                    pipeline = %self.name,
                    document_id = %context.document_id,
                    timeout_secs = self.soft_timeout.as_secs(),
                    "pipeline timed out"
                );
                RunStatus::TimedOut
            }
        };

        match status {
            RunStatus::Success => info!(
                pipeline = %self.name,
                document_id = %context.document_id,
                "pipeline completed"
            ),
            RunStatus::Failed => error!(
                pipeline = %self.name,
                document_id = %context.document_id,
                "pipeline failed"
            ),
            RunStatus::Cancelled => warn!(
                pipeline = %self.name,
                document_id = %context.document_id,
                "pipeline cancelled"
            ),
            _ => {}
        }

        self.report(context, status, started_at, started.elapsed())
    }

    async fn run_steps(&self, context: &mut PipelineContext, cancel: &CancelSignal) -> RunStatus {
        for step in &self.steps {
            if cancel.is_cancelled() {
                return RunStatus::Cancelled;
            }

            if step.should_skip(context) {
                let result = StepResult::skipped(format!("step '{}' was skipped", step.name()));
                info!(
                    pipeline = %self.name,
                    step = step.name(),
                    document_id = %context.document_id,
                    "skipped step"
                );
                context.step_results.insert(step.name().to_string(), result);
                continue;
            }

            match self.run_step_with_retry(step.as_ref(), context, cancel).await {
                StepFlow::Halt(status) => return status,
                StepFlow::Continue => {}
            }
        }
        RunStatus::Success
    }

    async fn run_step_with_retry(
        &self,
        step: &dyn PipelineStep,
        context: &mut PipelineContext,
        cancel: &CancelSignal,
    ) -> StepFlow {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            info!(
                pipeline = %self.name,
                step = step.name(),
                document_id = %context.document_id,
                attempt = attempt + 1,
                budget = step.max_retries() + 1,
                "executing step"
            );

            let outcome = tokio::select! {
                () = cancel.cancelled() => return StepFlow::Halt(RunStatus::Cancelled),
                outcome = step.execute(context) => outcome,
            };

            match outcome {
                Ok(message) => {
                    info!(
                        pipeline = %self.name,
                        step = step.name(),
                        document_id = %context.document_id,
                        "completed step: {message}"
                    );
                    context.step_results.insert(
                        step.name().to_string(),
                        StepResult::success(message, started.elapsed()),
                    );
                    return StepFlow::Continue;
                }
                Err(e) => {
                    if !step.should_retry(attempt, &e) {
                        error!(
                            pipeline = %self.name,
                            step = step.name(),
                            document_id = %context.document_id,
                            error = %e,
                            "step failed after {} attempts",
                            attempt + 1
                        );
                        context.step_results.insert(
                            step.name().to_string(),
                            StepResult::failed(
                                format!(
                                    "step '{}' failed after {} attempts",
                                    step.name(),
                                    attempt + 1
                                ),
                                e.to_string(),
                                started.elapsed(),
                            ),
                        );
                        return StepFlow::Halt(RunStatus::Failed);
                    }

                    warn!(
                        pipeline = %self.name,
                        step = step.name(),
                        document_id = %context.document_id,
                        error = %e,
                        "step attempt {} failed, retrying",
                        attempt + 1
                    );

                    // Exponential backoff: 2^attempt seconds after the
                    // 0-based attempt that just failed.
                    let backoff = Duration::from_secs(1u64 << attempt.min(16));
                    tokio::select! {
                        () = cancel.cancelled() => return StepFlow::Halt(RunStatus::Cancelled),
                        () = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn report(
        &self,
        context: &PipelineContext,
        status: RunStatus,
        started_at: DateTime<Utc>,
        total_duration: Duration,
    ) -> ExecutionReport {
        let steps: Vec<StepReport> = self
            .steps
            .iter()
            .map(|step| StepReport {
                name: step.name().to_string(),
                result: context
                    .step_results
                    .get(step.name())
                    .cloned()
                    .unwrap_or_else(StepResult::pending),
            })
            .collect();

        let steps_completed = steps
            .iter()
            .filter(|s| s.result.status == StepStatus::Success)
            .count();
        let steps_failed = steps
            .iter()
            .filter(|s| s.result.status == StepStatus::Failed)
            .count();

        ExecutionReport {
            pipeline_name: self.name.clone(),
            status,
            document_id: context.document_id.to_string(),
            user_id: context.user_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            total_duration,
            steps,
            steps_completed,
            steps_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::{ChunkError, DocumentId, EmbedError, UserId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ctx() -> PipelineContext {
        PipelineContext::new(
            DocumentId::generate(),
            UserId::parse("t@x.io").unwrap(),
            "doc.txt",
            "/tmp/doc",
        )
    }

    struct OkStep {
        name: &'static str,
    }

    #[async_trait]
    impl PipelineStep for OkStep {
        fn name(&self) -> &str {
            self.name
        }
        async fn execute(&self, context: &mut PipelineContext) -> Result<String, Error> {
            context
                .attributes
                .insert(self.name.to_string(), "ran".to_string());
            Ok(format!("{} done", self.name))
        }
    }

    struct FailStep;

    #[async_trait]
    impl PipelineStep for FailStep {
        fn name(&self) -> &str {
            "failing"
        }
        async fn execute(&self, _context: &mut PipelineContext) -> Result<String, Error> {
            Err(ChunkError::Failed("boom".to_string()).into())
        }
    }

    struct SkippedStep;

    #[async_trait]
    impl PipelineStep for SkippedStep {
        fn name(&self) -> &str {
            "conditional"
        }
        fn should_skip(&self, _context: &PipelineContext) -> bool {
            true
        }
        async fn execute(&self, _context: &mut PipelineContext) -> Result<String, Error> {
            panic!("skipped steps never execute");
        }
    }

    /// Fails `failures` times, then succeeds.
    struct FlakyStep {
        failures: u32,
        calls: Arc<AtomicU32>,
        retries: u32,
        retriable: bool,
    }

    #[async_trait]
    impl PipelineStep for FlakyStep {
        fn name(&self) -> &str {
            "flaky"
        }
        fn max_retries(&self) -> u32 {
            self.retries
        }
        fn should_retry(&self, attempt: u32, error: &Error) -> bool {
            let retriable = match error {
                Error::Embedding(e) => e.is_retriable(),
                _ => true,
            };
            retriable && attempt < self.max_retries()
        }
        async fn execute(&self, _context: &mut PipelineContext) -> Result<String, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.retriable {
                    Err(EmbedError::Provider {
                        status: Some(503),
                        message: "upstream".to_string(),
                    }
                    .into())
                } else {
                    Err(EmbedError::Auth("bad key".to_string()).into())
                }
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    struct SlowStep;

    #[async_trait]
    impl PipelineStep for SlowStep {
        fn name(&self) -> &str {
            "slow"
        }
        async fn execute(&self, _context: &mut PipelineContext) -> Result<String, Error> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let pipeline = Pipeline::new(
            "test",
            vec![
                Box::new(OkStep { name: "one" }),
                Box::new(OkStep { name: "two" }),
            ],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.steps_completed, 2);
        assert_eq!(report.steps_failed, 0);
        assert_eq!(context.attributes.get("one").map(String::as_str), Some("ran"));
    }

    #[tokio::test]
    async fn first_failure_terminates_and_later_steps_stay_pending() {
        let pipeline = Pipeline::new(
            "test",
            vec![
                Box::new(OkStep { name: "one" }),
                Box::new(FailStep),
                Box::new(OkStep { name: "three" }),
            ],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.steps_completed, 1);
        assert_eq!(report.steps_failed, 1);
        assert_eq!(report.steps[1].result.status, StepStatus::Failed);
        assert_eq!(report.steps[2].result.status, StepStatus::Pending);
        // The step after the failure never ran.
        assert!(!context.attributes.contains_key("three"));
    }

    #[tokio::test]
    async fn skipped_steps_are_recorded_not_executed() {
        let pipeline = Pipeline::new(
            "test",
            vec![Box::new(SkippedStep), Box::new(OkStep { name: "after" })],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.steps[0].result.status, StepStatus::Skipped);
        assert!(report.steps[0].result.message.contains("skipped"));
        assert_eq!(report.steps[1].result.status, StepStatus::Success);
    }

    #[tokio::test]
    async fn retriable_failures_recover_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let pipeline = Pipeline::new(
            "test",
            vec![Box::new(FlakyStep {
                failures: 2,
                calls: Arc::clone(&calls),
                retries: 2,
                retriable: true,
            })],
        );
        let mut context = ctx();
        let started = Instant::now();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff slept 2^0 + 2^1 seconds across the two retries.
        assert!(started.elapsed() >= Duration::from_secs(3));
        let duration = report.steps[0].result.duration.unwrap();
        assert!(duration >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn budget_exhaustion_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let pipeline = Pipeline::new(
            "test",
            vec![Box::new(FlakyStep {
                failures: 10,
                calls: Arc::clone(&calls),
                retries: 1,
                retriable: true,
            })],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(report.steps[0]
            .result
            .message
            .contains("failed after 2 attempts"));
    }

    #[tokio::test]
    async fn non_retriable_errors_skip_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let pipeline = Pipeline::new(
            "test",
            vec![Box::new(FlakyStep {
                failures: 10,
                calls: Arc::clone(&calls),
                retries: 3,
                retriable: false,
            })],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_halts_between_steps() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let pipeline = Pipeline::new("test", vec![Box::new(OkStep { name: "one" })]);
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &cancel).await;

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.steps[0].result.status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn cancellation_interrupts_an_inflight_step() {
        let cancel = CancelSignal::new();
        let pipeline = Pipeline::new("test", vec![Box::new(SlowStep)]);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let mut context = ctx();
        let report = pipeline.execute(&mut context, &cancel).await;
        assert_eq!(report.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn soft_timeout_cuts_the_run() {
        let pipeline = Pipeline::new("test", vec![Box::new(SlowStep)])
            .with_timeout(Duration::from_millis(100));
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        assert_eq!(report.status, RunStatus::TimedOut);
        assert_eq!(report.steps[0].result.status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn report_preserves_declared_order() {
        let pipeline = Pipeline::new(
            "test",
            vec![
                Box::new(OkStep { name: "alpha" }),
                Box::new(OkStep { name: "beta" }),
                Box::new(OkStep { name: "gamma" }),
            ],
        );
        let mut context = ctx();
        let report = pipeline.execute(&mut context, &CancelSignal::new()).await;

        let names: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta", "gamma"]);
    }
}
