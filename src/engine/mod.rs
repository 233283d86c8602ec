//! Orchestrator
//!
//! Runs the five stages strictly in order under a validated state machine.
//!
//! # Overview
//!
//! - [`Pipeline`] owns the configuration, the download client and the
//!   warehouse, and executes one run per [`Pipeline::run`]
//! - [`RunTracker`] validates and timestamps every state change
//! - A failed stage is retried as a whole after a fixed delay, up to the
//!   configured budget; the run then ends `Failed` with the originating error

mod types;

pub use types::{
    RetryPolicy, RunReport, RunState, RunSummary, RunTracker, StageKind, Transition,
};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};
use crate::output::StagingDestination;
use crate::stages;
use crate::warehouse::{self, Warehouse};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One configured pipeline, runnable any number of times
pub struct Pipeline {
    config: PipelineConfig,
    client: HttpClient,
    warehouse: Arc<dyn Warehouse>,
    retry: RetryPolicy,
}

impl Pipeline {
    /// Create a pipeline over an existing warehouse
    pub fn new(config: PipelineConfig, warehouse: Arc<dyn Warehouse>) -> Result<Self> {
        let client = HttpClient::with_config(
            HttpClientConfig::builder()
                .timeout(config.source.timeout())
                .max_retries(0)
                .build(),
        )?;
        let retry = RetryPolicy::from(&config.retry);

        Ok(Self {
            config,
            client,
            warehouse,
            retry,
        })
    }

    /// Create a pipeline with the configured warehouse backend
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let warehouse = warehouse::from_config(&config)?;
        Self::new(config, warehouse)
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Execute one run from `Pending`. Never returns early: failures are
    /// reported in the [`RunReport`].
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let run_id = format!("run_{}", started_at.format("%Y%m%dT%H%M%S%.3fZ"));
        info!(run_id = %run_id, periods = self.config.periods.len(), "Pipeline run started");

        let mut tracker = RunTracker::new();
        let mut summary = RunSummary::default();
        let outcome = self.execute(&mut tracker, &mut summary).await;

        let (failed_stage, error) = match outcome {
            Ok(()) => {
                info!(run_id = %run_id, "Pipeline run succeeded");
                (None, None)
            }
            Err(e) => {
                error!(
                    run_id = %run_id,
                    stage = ?tracker.stage().map(|s| s.task_id()),
                    kind = e.kind(),
                    "Pipeline run failed: {}",
                    e
                );
                if self.config.schedule.email_on_failure {
                    warn!("email_on_failure is set but no mail transport is configured");
                }
                (tracker.stage(), Some(e))
            }
        };

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            final_state: tracker.state(),
            transitions: tracker.transitions().to_vec(),
            failed_stage,
            error,
            summary,
        }
    }

    async fn execute(&self, tracker: &mut RunTracker, summary: &mut RunSummary) -> Result<()> {
        let config = &self.config;

        let scratch = self
            .run_stage(tracker, StageKind::Download, || {
                stages::fetch(config, &self.client)
            })
            .await?;
        summary.fetched = scratch.files.clone();

        summary.cleaned = self
            .run_stage(tracker, StageKind::Preprocess, || {
                stages::clean(config, &scratch)
            })
            .await?;

        summary.staged = self
            .run_stage(tracker, StageKind::Upload, || self.upload())
            .await?;

        let definition = self
            .run_stage(tracker, StageKind::Register, || {
                stages::register(config, self.warehouse.as_ref())
            })
            .await?;
        summary.external_table = Some(definition.table.to_string());

        summary.materialization = Some(
            self.run_stage(tracker, StageKind::Materialize, || {
                stages::materialize(config, self.warehouse.as_ref())
            })
            .await?,
        );

        tracker.transition(RunState::Succeeded)
    }

    /// Parses `staging.url` on every attempt
    async fn upload(&self) -> Result<Vec<stages::StagedObject>> {
        let destination = StagingDestination::parse(&self.config.staging_url())?;
        stages::stage(&self.config, &destination).await
    }

    /// Run `body` as `stage`, retrying the whole stage per the retry policy
    async fn run_stage<T, F, Fut>(
        &self,
        tracker: &mut RunTracker,
        stage: StageKind,
        mut body: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tracker.begin_stage(stage)?;

        loop {
            let attempt = tracker.attempt();
            info!(stage = stage.task_id(), attempt, "Stage started");

            let error = match body().await {
                Ok(value) => {
                    info!(stage = stage.task_id(), attempt, "Stage finished");
                    return Ok(value);
                }
                Err(e) => e,
            };

            tracker.transition(RunState::Failed)?;

            if !self.retry.allows_retry(attempt) {
                error!(
                    stage = stage.task_id(),
                    attempt,
                    kind = error.kind(),
                    "Stage failed, no retries left: {}",
                    error
                );
                return Err(error);
            }

            warn!(
                stage = stage.task_id(),
                attempt,
                delay_ms = self.retry.delay.as_millis() as u64,
                "Stage failed, retrying: {}",
                error
            );
            if self.config.schedule.email_on_retry {
                warn!("email_on_retry is set but no mail transport is configured");
            }

            tokio::time::sleep(self.retry.delay).await;
            tracker.transition(RunState::Retrying)?;
            tracker.transition(stage.state())?;
        }
    }
}
