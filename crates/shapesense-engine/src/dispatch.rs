//! Engine facade and explicit background dispatch.
//!
//! Triggers arrive from independent, unsynchronized paths: a per-ingest
//! hook, a per-upload hook, a periodic schedule, and an on-demand
//! administrative call. Request paths hand work to [`Engine::submit`] and
//! move on; the returned handle and the [`Engine::last_run`] status cell
//! make completion and errors observable instead of fire-and-forget.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use shapesense_config::EngineConfig;
use shapesense_core::{ArcNormalizedStore, ArcRawStore, ArcSchemaStore};

use crate::errors::EngineResult;
use crate::inference::InferenceCoordinator;
use crate::sweeper::{NormalizationSweeper, SweepReport};

/// What caused an engine run. Recorded verbatim in the ledger notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Ingest,
    Upload,
    Schedule,
    Manual,
}

impl Trigger {
    pub const fn as_notes(&self) -> &'static str {
        match self {
            Trigger::Ingest => "on-ingest",
            Trigger::Upload => "upload",
            Trigger::Schedule => "cron",
            Trigger::Manual => "manual",
        }
    }
}

/// Result of one full engine run (inference followed by a sweep).
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Version number committed by this run's inference pass, if any.
    pub created_version: Option<u32>,

    /// Per-record outcomes of this run's sweep.
    pub sweep: SweepReport,
}

/// Condensed record of the most recent background run.
#[derive(Debug, Clone)]
pub struct LastRun {
    pub trigger: &'static str,
    pub created_version: Option<u32>,
    pub normalized: usize,
    pub failed: usize,
    /// Present when the run aborted; previously committed state is intact.
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Bundles the two passes over shared store handles.
pub struct Engine {
    coordinator: InferenceCoordinator,
    sweeper: NormalizationSweeper,
    cfg: EngineConfig,
    last_run: Mutex<Option<LastRun>>,
}

impl Engine {
    pub fn new(
        raw: ArcRawStore,
        schemas: ArcSchemaStore,
        normalized: ArcNormalizedStore,
        cfg: EngineConfig,
    ) -> Self {
        let coordinator = InferenceCoordinator::new(
            Arc::clone(&raw),
            Arc::clone(&schemas),
            &cfg,
        );
        let sweeper = NormalizationSweeper::new(raw, schemas, normalized, &cfg);
        Self {
            coordinator,
            sweeper,
            cfg,
            last_run: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Status of the most recently finished background run, for embedders
    /// that trigger without joining.
    pub fn last_run(&self) -> Option<LastRun> {
        self.last_run.lock().clone()
    }

    /// One inference attempt with the configured sample parameters.
    pub async fn run_inference(
        &self,
        trigger: Trigger,
    ) -> EngineResult<Option<shapesense_core::SchemaVersion>> {
        self.coordinator
            .infer_and_maybe_create_version(
                self.cfg.sample_size,
                self.cfg.optional_threshold,
                trigger.as_notes(),
            )
            .await
    }

    /// One normalization sweep over the configured window.
    pub async fn run_sweep(&self) -> EngineResult<SweepReport> {
        self.sweeper.normalize_pending().await
    }

    /// Inference then sweep, sequentially — the scheduled/administrative
    /// path. A conflict or outage during inference aborts the run; already
    /// committed versions and normalized records are untouched.
    pub async fn run_once(&self, trigger: Trigger) -> EngineResult<RunSummary> {
        let created = self.run_inference(trigger).await?;
        let sweep = self.run_sweep().await?;
        Ok(RunSummary {
            created_version: created.map(|v| v.version),
            sweep,
        })
    }

    /// Dispatch a full run as a detached background task.
    ///
    /// Returns immediately; the triggering request path never awaits the
    /// run. Errors are logged inside the task, recorded in [`last_run`],
    /// and also surface through the returned handle for callers that do
    /// want to observe completion.
    ///
    /// [`last_run`]: Engine::last_run
    pub fn submit(self: Arc<Self>, trigger: Trigger) -> EngineTask {
        let engine = self;
        let join = tokio::spawn(async move {
            let outcome = engine.run_once(trigger).await;
            match &outcome {
                Ok(summary) => info!(
                    trigger = trigger.as_notes(),
                    created_version = summary.created_version,
                    normalized = summary.sweep.normalized(),
                    "background engine run finished"
                ),
                Err(e) => error!(
                    trigger = trigger.as_notes(),
                    error = %e,
                    "background engine run failed"
                ),
            }
            engine.record_last_run(trigger, &outcome);
            outcome
        });

        EngineTask { join }
    }

    fn record_last_run(
        &self,
        trigger: Trigger,
        outcome: &EngineResult<RunSummary>,
    ) {
        let entry = match outcome {
            Ok(summary) => LastRun {
                trigger: trigger.as_notes(),
                created_version: summary.created_version,
                normalized: summary.sweep.normalized(),
                failed: summary.sweep.failed(),
                error: None,
                finished_at: Utc::now(),
            },
            Err(e) => LastRun {
                trigger: trigger.as_notes(),
                created_version: None,
                normalized: 0,
                failed: 0,
                error: Some(e.to_string()),
                finished_at: Utc::now(),
            },
        };
        *self.last_run.lock() = Some(entry);
    }
}

/// Handle for a submitted background run.
pub struct EngineTask {
    join: JoinHandle<EngineResult<RunSummary>>,
}

impl EngineTask {
    /// Wait for the run to complete and return its summary.
    pub async fn join(self) -> Result<RunSummary> {
        match self.join.await {
            Ok(r) => Ok(r?),
            Err(e) => Err(anyhow!("engine task panicked: {e}")),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
