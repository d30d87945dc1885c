//! Conversion Pipeline - Single Entry Point
//!
//! resolve -> fetch -> render -> publish, stopping at the first failure.
//! Nothing is retried and nothing already in storage is rolled back: a
//! failed publish leaves the source blob as it was and no output blob.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, field, info, info_span, warn, Span};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ErrorKind, PipelineError};
use crate::hashing::compute_job_hash;
use crate::options::{self, InvocationRequest, RenderOptions};
use crate::render::{self, AsciiRenderer, Renderer};
use crate::staging::StagingArea;
use crate::storage::{BlobStore, S3Store};
use crate::transfer::BlobTransfer;

/// What the invoking harness gets back. `body` is the output key on
/// success and an error sentence otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub body: String,
}

/// `InvocationResult` plus a machine-readable status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub body: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Set once the options resolved; equal for equal re-runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_hash: Option<String>,
}

impl InvocationOutcome {
    pub fn success(output_id: String) -> Self {
        Self {
            body: output_id,
            ok: true,
            error_kind: None,
            job_hash: None,
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        Self {
            body: err.to_string(),
            ok: false,
            error_kind: Some(err.kind()),
            job_hash: None,
        }
    }

    pub fn with_job_hash(mut self, job_hash: Option<String>) -> Self {
        self.job_hash = job_hash;
        self
    }
}

/// A resolved invocation, ready to execute.
struct Job {
    subject_id: String,
    options: RenderOptions,
    job_hash: Option<String>,
}

impl From<InvocationOutcome> for InvocationResult {
    fn from(outcome: InvocationOutcome) -> Self {
        Self { body: outcome.body }
    }
}

/// The production wiring: S3-compatible storage and the built-in renderer.
pub type S3Pipeline = Pipeline<S3Store, AsciiRenderer>;

pub struct Pipeline<S: BlobStore, R: Renderer> {
    store: S,
    renderer: R,
    staging: StagingArea,
}

impl S3Pipeline {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            S3Store::new(config.storage.clone()),
            AsciiRenderer::new(),
            StagingArea::new(&config.staging.dir),
        )
    }
}

impl<S: BlobStore, R: Renderer> Pipeline<S, R> {
    pub fn new(store: S, renderer: R, staging: StagingArea) -> Self {
        Self {
            store,
            renderer,
            staging,
        }
    }

    /// Legacy boundary: a single `body` field.
    pub fn handle(&self, request: &InvocationRequest) -> InvocationResult {
        self.handle_detailed(request).into()
    }

    /// Run one invocation and report the outcome without ever panicking.
    pub fn handle_detailed(&self, request: &InvocationRequest) -> InvocationOutcome {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("invocation", %invocation_id, media_id = field::Empty);
        let _entered = span.enter();

        let mut job_hash = None;
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<String, PipelineError> {
            let job = self.prepare(request)?;
            job_hash = job.job_hash.clone();
            self.execute(&job)
        }))
        .unwrap_or_else(|panic| Err(PipelineError::Internal(panic_message(&*panic))));

        let outcome = match result {
            Ok(output_id) => {
                info!(output = %output_id, "invocation succeeded");
                InvocationOutcome::success(output_id)
            }
            Err(err) => {
                error!(kind = ?err.kind(), error = %err, "invocation failed");
                InvocationOutcome::failure(&err)
            }
        };
        outcome.with_job_hash(job_hash)
    }

    /// Structured form of [`Pipeline::handle`]. Returns the output key.
    pub fn run(&self, request: &InvocationRequest) -> Result<String, PipelineError> {
        let job = self.prepare(request)?;
        self.execute(&job)
    }

    fn prepare(&self, request: &InvocationRequest) -> Result<Job, PipelineError> {
        let defaults = RenderOptions::staged_in(self.staging.dir());
        let resolved = options::resolve_with(request, &defaults)?;
        Span::current().record("media_id", resolved.subject_id.as_str());

        let job_hash = match compute_job_hash(&resolved.subject_id, &resolved.options) {
            Ok(job_hash) => {
                info!(%job_hash, "processing image");
                Some(job_hash)
            }
            Err(e) => {
                warn!(error = %e, "could not compute job hash");
                None
            }
        };

        Ok(Job {
            subject_id: resolved.subject_id,
            options: resolved.options,
            job_hash,
        })
    }

    fn execute(&self, job: &Job) -> Result<String, PipelineError> {
        let subject_id = job.subject_id.as_str();
        let transfer = BlobTransfer::new(&self.store, &self.staging);

        debug!("fetching source");
        let source = transfer.fetch(subject_id)?;

        debug!("rendering");
        let rendered = render::render_staged(&self.renderer, &source, &job.options)?;
        drop(source);

        debug!("publishing");
        transfer.publish(subject_id, &rendered)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
