//! Bulk re-rendering of every stored image of a field.
//!
//! Used by the `render` maintenance command after variations change or
//! storage is restored. Each record with a stored file becomes a
//! [`RenderJob`]; jobs run on a dedicated rayon pool.
//!
//! ## Worker storage
//!
//! Storage handles are never shared between workers. Before any job runs,
//! every pool thread connects exactly once from the [`StorageDescriptor`],
//! so a backend only has to be `Send + Sync`, not safe for concurrent use
//! of one connection.
//!
//! ## Progress
//!
//! A [`ProgressEvent`] is sent after every job, carrying the number of jobs
//! completed so far (an atomic counter, so the values are exact even though
//! completion order is not).

use crate::imaging::VariationBackend;
use crate::records::FieldRecord;
use crate::render::{RenderError, RenderOutcome, RenderStatus, Renderer};
use crate::storage::{Storage, StorageDescriptor, StorageError};
use crate::variations::{
    FieldSelector, FieldVariations, ImageFieldConfig, RecordContext, RenderPolicy,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BulkError {
    #[error(
        "Source file was not found, terminating: {path}. Use -i/--ignore-missing to skip this error."
    )]
    MissingSource { path: String },
    #[error("Rendering {path} failed: {source}")]
    Render { path: String, source: RenderError },
    #[error("Failed to open storage: {0}")]
    Connect(String),
    #[error("Failed to start worker pool: {0}")]
    Pool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Re-render artifacts that already exist.
    pub replace: bool,
    /// Skip records whose source is missing instead of aborting.
    pub ignore_missing: bool,
    /// Worker count; values below 1 are treated as 1.
    pub threads: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            replace: false,
            ignore_missing: false,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// One record's work in a bulk run.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    pub selector: &'a FieldSelector,
    pub pk: Option<String>,
    pub source: String,
    pub variations: &'a FieldVariations,
    pub policy: &'a RenderPolicy,
    pub replace: bool,
    pub ignore_missing: bool,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every variation was rendered or already present.
    Rendered(Vec<RenderOutcome>),
    /// The field's render policy declined this record.
    SkippedByPolicy,
    /// The source was missing and `ignore_missing` was set.
    SkippedMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    FieldStarted {
        selector: String,
        total: usize,
        threads: usize,
    },
    JobFinished {
        completed: usize,
        total: usize,
        source: String,
        outcome: JobOutcome,
    },
}

/// Counts for one bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub selector: String,
    /// Records with a stored file.
    pub total: usize,
    /// Records whose variations were all rendered or present.
    pub records_rendered: usize,
    /// Artifacts newly written.
    pub rendered: usize,
    /// Artifacts deleted and written again.
    pub replaced: usize,
    /// Artifacts left as they were.
    pub existing: usize,
    /// Records declined by the render policy.
    pub policy_skipped: usize,
    /// Sources skipped because they were missing.
    pub missing: Vec<String>,
}

impl BulkReport {
    fn record(&mut self, job: &RenderJob<'_>, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Rendered(outcomes) => {
                self.records_rendered += 1;
                for o in outcomes {
                    match o.status {
                        RenderStatus::Rendered => self.rendered += 1,
                        RenderStatus::Replaced => self.replaced += 1,
                        RenderStatus::Existing => self.existing += 1,
                    }
                }
            }
            JobOutcome::SkippedByPolicy => self.policy_skipped += 1,
            JobOutcome::SkippedMissing => self.missing.push(job.source.clone()),
        }
    }
}

impl RenderJob<'_> {
    /// Run the job against one worker's renderer.
    pub fn run(&self, renderer: &Renderer<'_>) -> Result<JobOutcome, BulkError> {
        let ctx = RecordContext {
            selector: self.selector,
            pk: self.pk.as_deref(),
            file_name: &self.source,
            variations: self.variations,
        };
        if !self.policy.should_render(&ctx) {
            info!(source = %self.source, "render policy declined, skipping");
            return Ok(JobOutcome::SkippedByPolicy);
        }

        match renderer.render_all(&self.source, self.variations, self.replace) {
            Ok(outcomes) => Ok(JobOutcome::Rendered(outcomes)),
            Err(RenderError::SourceNotFound(path)) if self.ignore_missing => {
                warn!("source file was not found, skipping: {path}");
                Ok(JobOutcome::SkippedMissing)
            }
            Err(RenderError::SourceNotFound(path)) => Err(BulkError::MissingSource { path }),
            Err(source) => Err(BulkError::Render {
                path: self.source.clone(),
                source,
            }),
        }
    }
}

/// Plan one job per record with a stored file, in record order.
pub fn plan_jobs<'a>(
    selector: &'a FieldSelector,
    field: &'a ImageFieldConfig,
    records: &[FieldRecord],
    options: &BulkOptions,
) -> Vec<RenderJob<'a>> {
    records
        .iter()
        .filter_map(|record| {
            record.stored_path().map(|path| RenderJob {
                selector,
                pk: Some(record.pk.clone()),
                source: path.to_string(),
                variations: &field.variations,
                policy: &field.render_on_save,
                replace: options.replace,
                ignore_missing: options.ignore_missing,
            })
        })
        .collect()
}

/// Render every variation of every record of a field.
///
/// Aborts on the first job error; artifacts written by jobs that already
/// finished stay in storage.
pub fn render_bulk(
    selector: &FieldSelector,
    field: &ImageFieldConfig,
    records: &[FieldRecord],
    descriptor: &StorageDescriptor,
    backend: &dyn VariationBackend,
    options: &BulkOptions,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<BulkReport, BulkError> {
    let jobs = plan_jobs(selector, field, records, options);
    let total = jobs.len();
    let threads = options.threads.max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| BulkError::Pool(e.to_string()))?;

    info!(
        field = %selector,
        storage = %descriptor.label(),
        total,
        threads,
        "rendering variations"
    );
    if let Some(tx) = &progress {
        tx.send(ProgressEvent::FieldStarted {
            selector: selector.to_string(),
            total,
            threads,
        })
        .ok();
    }

    let storages = connect_workers(&pool, descriptor)?;
    let completed = AtomicUsize::new(0);
    let outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| -> Result<JobOutcome, BulkError> {
                let storage = rayon::current_thread_index()
                    .and_then(|i| storages.get(i))
                    .ok_or_else(|| BulkError::Pool("job ran outside the worker pool".into()))?;
                let renderer = Renderer::new(&**storage, backend);
                let outcome = job.run(&renderer)?;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(tx) = &progress {
                    tx.send(ProgressEvent::JobFinished {
                        completed: done,
                        total,
                        source: job.source.clone(),
                        outcome: outcome.clone(),
                    })
                    .ok();
                }
                Ok(outcome)
            })
            .collect::<Result<Vec<_>, BulkError>>()
    })?;

    let mut report = BulkReport {
        selector: selector.to_string(),
        total,
        ..BulkReport::default()
    };
    for (job, outcome) in jobs.iter().zip(&outcomes) {
        report.record(job, outcome);
    }
    Ok(report)
}

/// Open one storage handle per pool thread, indexed by
/// `rayon::current_thread_index()`.
fn connect_workers(
    pool: &rayon::ThreadPool,
    descriptor: &StorageDescriptor,
) -> Result<Vec<Box<dyn Storage>>, BulkError> {
    pool.broadcast(|ctx| -> Result<Box<dyn Storage>, StorageError> {
        let storage = descriptor.connect()?;
        debug!(storage = storage.name(), worker = ctx.index(), "worker connected");
        Ok(storage)
    })
    .into_iter()
    .collect::<Result<Vec<_>, StorageError>>()
    .map_err(|e| BulkError::Connect(e.to_string()))
}
