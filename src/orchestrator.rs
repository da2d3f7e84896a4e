//! Pipeline orchestrator for Vidnotes.
//!
//! Drives every work item through extract, transcribe and summarize, skipping
//! work whose artifacts are fresh and resuming from the first stage that is
//! not. Each item moves through a small state machine:
//!
//! ```text
//! Pending -> Extracting -> Transcribing -> Summarizing -> Done
//!                 \______________\______________\______-> Failed(stage)
//! ```
//!
//! Pending jumps straight to the first stage whose artifact is not fresh, or
//! to Done when all three are. Once a stage runs, every later stage runs too.

use crate::artifact::{ArtifactStatus, ArtifactStore};
use crate::config::Settings;
use crate::discovery::WorkItem;
use crate::error::{Result, VidnotesError};
use crate::report::{BatchReport, ItemReport, PipelineResult};
use crate::stage::{Stage, StageRunners};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Per-item progress through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Extracting,
    Transcribing,
    Summarizing,
    Done { skipped: bool },
    Failed { stage: Stage, error: String },
    Cancelled,
}

impl ItemState {
    /// In-progress state for a stage.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Extract => ItemState::Extracting,
            Stage::Transcribe => ItemState::Transcribing,
            Stage::Summarize => ItemState::Summarizing,
        }
    }

    /// Stage being run, if in progress.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ItemState::Extracting => Some(Stage::Extract),
            ItemState::Transcribing => Some(Stage::Transcribe),
            ItemState::Summarizing => Some(Stage::Summarize),
            _ => None,
        }
    }

    /// State after the running stage succeeded.
    pub fn advance(stage: Stage) -> Self {
        stage
            .next()
            .map(ItemState::running)
            .unwrap_or(ItemState::Done { skipped: false })
    }

    /// State after the running stage failed.
    pub fn fail(stage: Stage, err: &VidnotesError) -> Self {
        match err {
            VidnotesError::Cancelled => ItemState::Cancelled,
            other => ItemState::Failed {
                stage,
                error: other.to_string(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::Done { .. } | ItemState::Failed { .. } | ItemState::Cancelled
        )
    }

    fn into_result(self) -> PipelineResult {
        match self {
            ItemState::Done { skipped: true } => PipelineResult::SkippedAlreadyDone,
            ItemState::Done { skipped: false } => PipelineResult::Completed,
            ItemState::Failed { stage, error } => PipelineResult::FailedAtStage { stage, error },
            _ => PipelineResult::Cancelled,
        }
    }
}

/// Upper bound on each stage invocation.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub extract: Duration,
    pub transcribe: Duration,
    pub summarize: Duration,
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Extract => self.extract,
            Stage::Transcribe => self.transcribe,
            Stage::Summarize => self.summarize,
        }
    }
}

/// Batch policy for a controller.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Abort remaining items after the first failure.
    pub fail_fast: bool,
    /// Items processed concurrently.
    pub jobs: usize,
    /// Re-run every stage regardless of artifact status.
    pub force: bool,
    /// Transcriptions allowed in flight at once.
    pub device_concurrency: usize,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fail_fast: settings.pipeline.fail_fast,
            jobs: settings.pipeline.jobs.max(1),
            force: false,
            device_concurrency: settings.transcription.device_concurrency.max(1),
            timeouts: StageTimeouts {
                extract: settings.extraction_timeout(),
                transcribe: settings.transcription_timeout(),
                summarize: settings.generation_timeout(),
            },
        }
    }
}

/// Runs batches of work items through the stage runners.
pub struct PipelineController {
    store: ArtifactStore,
    runners: StageRunners,
    options: PipelineOptions,
    device: Arc<Semaphore>,
    progress: Option<ProgressBar>,
}

impl PipelineController {
    /// Create a controller writing under the configured output directory.
    pub fn new(settings: &Settings, runners: StageRunners) -> Self {
        let store = ArtifactStore::new(settings.output_dir(), settings.pipeline.staleness);
        Self::with_options(store, runners, PipelineOptions::from_settings(settings))
    }

    /// Create a controller with custom components.
    pub fn with_options(store: ArtifactStore, runners: StageRunners, options: PipelineOptions) -> Self {
        let device = Arc::new(Semaphore::new(options.device_concurrency.max(1)));
        Self {
            store,
            runners,
            options,
            device,
            progress: None,
        }
    }

    /// Re-run every stage regardless of artifact status.
    pub fn force(mut self, force: bool) -> Self {
        self.options.force = force;
        self
    }

    /// Report item completion on a progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Process a batch and report one outcome per item, in input order.
    ///
    /// Item failures are recorded and the batch continues, unless fail-fast
    /// is set, in which case the remaining items are cancelled.
    pub async fn run(&self, items: &[WorkItem], cancel: &CancellationToken) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("batch", run_id = %run_id, items = items.len());

        self.store.ensure_layout()?;
        let abort = cancel.child_token();

        let report = async {
            info!("Processing {} item(s) into {:?}", items.len(), self.store.root());

            let mut results: Vec<(usize, ItemReport)> = stream::iter(items.iter().enumerate())
                .map(|(idx, item)| {
                    let abort = abort.clone();
                    async move {
                        let report = self.process_item(item, &abort).await;
                        if self.options.fail_fast && report.result.is_failed() {
                            warn!("Fail-fast: aborting batch after failure of '{}'", item.key());
                            abort.cancel();
                        }
                        if let Some(pb) = &self.progress {
                            pb.inc(1);
                        }
                        (idx, report)
                    }
                })
                .buffer_unordered(self.options.jobs.max(1))
                .collect()
                .await;

            results.sort_by_key(|(idx, _)| *idx);

            let report = BatchReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                items: results.into_iter().map(|(_, r)| r).collect(),
            };

            info!(
                "Batch finished: {} completed, {} skipped, {} failed, {} cancelled",
                report.completed(),
                report.skipped(),
                report.failed(),
                report.cancelled()
            );

            report
        }
        .instrument(span)
        .await;

        Ok(report)
    }

    /// Drive one item to a terminal state.
    ///
    /// A fatal error such as a missing tool cancels `cancel`, since every
    /// other item would hit it too.
    #[instrument(skip(self, item, cancel), fields(key = %item.key()))]
    pub async fn process_item(&self, item: &WorkItem, cancel: &CancellationToken) -> ItemReport {
        let started = Instant::now();
        let mut stages_run = Vec::new();
        let mut state = ItemState::Pending;

        while !state.is_terminal() {
            state = match state.stage() {
                None if cancel.is_cancelled() => ItemState::Cancelled,
                None => match self.first_pending_stage(item) {
                    Ok(None) => {
                        info!("All artifacts fresh, skipping");
                        ItemState::Done { skipped: true }
                    }
                    Ok(Some(stage)) => {
                        debug!("Resuming at {}", stage);
                        ItemState::running(stage)
                    }
                    Err((stage, e)) => ItemState::fail(stage, &e),
                },
                Some(stage) => {
                    if let Some(pb) = &self.progress {
                        pb.set_message(format!("{}: {}", item.key(), stage));
                    }
                    stages_run.push(stage);
                    match self.run_stage(item, stage, cancel).await {
                        Ok(_) => ItemState::advance(stage),
                        Err(e) => {
                            match &e {
                                VidnotesError::Cancelled => warn!("Cancelled during {}", stage),
                                other if other.is_fatal() => {
                                    error!("{} failed: {}; aborting batch", stage, other);
                                    cancel.cancel();
                                }
                                other => error!("{} failed: {}", stage, other),
                            }
                            ItemState::fail(stage, &e)
                        }
                    }
                }
            };
        }

        let notes = matches!(state, ItemState::Done { .. })
            .then(|| self.store.path_for(item.key(), Stage::Summarize));

        ItemReport {
            key: item.key().to_string(),
            source: item.source().to_path_buf(),
            result: state.into_result(),
            notes,
            stages_run,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// First stage, in order, whose artifact is not fresh.
    fn first_pending_stage(
        &self,
        item: &WorkItem,
    ) -> std::result::Result<Option<Stage>, (Stage, VidnotesError)> {
        if self.options.force {
            return Ok(Some(Stage::Extract));
        }
        for stage in Stage::ALL {
            match self.store.status(item, stage) {
                Ok(ArtifactStatus::Fresh) => continue,
                Ok(status) => {
                    debug!("{} artifact is {}", stage, status);
                    return Ok(Some(stage));
                }
                Err(e) => return Err((stage, e)),
            }
        }
        Ok(None)
    }

    /// Run one stage into a staging file, then commit and record it.
    async fn run_stage(
        &self,
        item: &WorkItem,
        stage: Stage,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let input = self.store.input_for(item, stage);
        let staged = self.store.stage(item.key(), stage)?;
        let runner = self.runners.for_stage(stage);
        let limit = self.options.timeouts.for_stage(stage);

        let _permit = if stage == Stage::Transcribe {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(VidnotesError::Cancelled),
                permit = self.device.clone().acquire_owned() => permit,
            };
            Some(permit.map_err(|_| VidnotesError::Cancelled)?)
        } else {
            None
        };

        info!("Running {} ({:?} -> {:?})", stage, input, staged.target());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VidnotesError::Cancelled),
            result = tokio::time::timeout(limit, runner.run(&input, staged.path())) => match result {
                Ok(inner) => inner,
                Err(_) => Err(VidnotesError::Timeout { stage, after: limit }),
            },
        };

        // staging file is removed when `staged` drops on the error path
        outcome?;

        let path = self.store.commit(staged)?;
        self.store.record(item, stage, &path)?;
        Ok(path)
    }
}
