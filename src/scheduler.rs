//! Fixed-interval scheduler
//!
//! Runs the pipeline once per interval, the first run immediately. Missed
//! intervals are skipped unless `schedule.catchup` is set. A run is never
//! interrupted: shutdown is observed between runs.

use crate::config::ScheduleConfig;
use crate::engine::{Pipeline, RunReport};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Counts from a scheduler session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub runs: u32,
    pub failures: u32,
}

pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
    catchup: bool,
    max_runs: Option<u32>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, config: &ScheduleConfig) -> Self {
        Self {
            pipeline,
            interval: config.interval(),
            catchup: config.catchup,
            max_runs: None,
        }
    }

    /// Stop after this many runs
    #[must_use]
    pub fn with_max_runs(mut self, max_runs: Option<u32>) -> Self {
        self.max_runs = max_runs;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until Ctrl-C or `max_runs`
    pub async fn run<F>(&self, on_report: F) -> ScheduleOutcome
    where
        F: FnMut(&RunReport),
    {
        self.run_until(
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            on_report,
        )
        .await
    }

    /// Run until `shutdown` resolves or `max_runs` is reached
    pub async fn run_until<S, F>(&self, shutdown: S, mut on_report: F) -> ScheduleOutcome
    where
        S: Future<Output = ()>,
        F: FnMut(&RunReport),
    {
        // tokio rejects a zero period
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(if self.catchup {
            MissedTickBehavior::Burst
        } else {
            MissedTickBehavior::Skip
        });

        let mut outcome = ScheduleOutcome::default();
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), max_runs = ?self.max_runs, "Scheduler started");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.pipeline.run().await;
                    outcome.runs += 1;
                    if !report.succeeded() {
                        outcome.failures += 1;
                        error!(run_id = %report.run_id, "Scheduled run failed");
                    }
                    on_report(&report);

                    if self.max_runs.is_some_and(|max| outcome.runs >= max) {
                        break;
                    }
                }
            }
        }

        info!(runs = outcome.runs, failures = outcome.failures, "Scheduler stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::engine::RetryPolicy;
    use crate::warehouse::DuckDbWarehouse;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn failing_pipeline(server: &MockServer, scratch: &std::path::Path) -> Pipeline {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;

        let mut config = PipelineConfig::default();
        config.source.base_url = server.uri();
        config.scratch_dir = scratch.to_path_buf();
        Pipeline::new(config, Arc::new(DuckDbWarehouse::in_memory().unwrap()))
            .unwrap()
            .with_retry(RetryPolicy::new(0, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_scheduler_stops_after_max_runs() {
        let server = MockServer::start().await;
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = failing_pipeline(&server, scratch.path()).await;

        let scheduler = Scheduler::new(pipeline, &ScheduleConfig::default())
            .with_interval(Duration::from_millis(5))
            .with_max_runs(Some(2));

        let mut seen = Vec::new();
        let outcome = scheduler
            .run_until(std::future::pending::<()>(), |report| {
                seen.push(report.run_id.clone());
            })
            .await;

        assert_eq!(outcome, ScheduleOutcome { runs: 2, failures: 2 });
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_scheduler_shutdown_before_first_run() {
        let server = MockServer::start().await;
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = failing_pipeline(&server, scratch.path()).await;

        let scheduler = Scheduler::new(pipeline, &ScheduleConfig::default());
        let outcome = scheduler.run_until(async {}, |_| {}).await;
        assert_eq!(outcome.runs, 0);
    }
}
