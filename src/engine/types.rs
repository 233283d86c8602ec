//! Orchestrator types
//!
//! Run states, stage identities, the transition log and the run report.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::stages::{CleanReport, FetchedFile, StagedObject};
use crate::warehouse::JobSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Run State
// ============================================================================

/// State of one pipeline run
///
/// ```text
/// Pending -> Downloading -> Preprocessing -> Staging -> Registering -> Materializing -> Succeeded
///               \______________\_______________\__________\_______________\-> Failed
/// Failed -> Retrying -> <the failed stage's state>
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Downloading,
    Preprocessing,
    Staging,
    Registering,
    Materializing,
    Succeeded,
    Failed,
    Retrying,
}

impl RunState {
    /// Returns true if no further transition is expected.
    ///
    /// `Failed` is terminal unless the retry budget allows `Failed -> Retrying`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true for the states in which a stage body runs.
    #[must_use]
    pub const fn is_stage(&self) -> bool {
        matches!(
            self,
            Self::Downloading
                | Self::Preprocessing
                | Self::Staging
                | Self::Registering
                | Self::Materializing
        )
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// `Retrying` may move to any stage state here; the tracker additionally
    /// requires it to be the stage that failed.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Downloading | Self::Failed),
            Self::Downloading => matches!(target, Self::Preprocessing | Self::Failed),
            Self::Preprocessing => matches!(target, Self::Staging | Self::Failed),
            Self::Staging => matches!(target, Self::Registering | Self::Failed),
            Self::Registering => matches!(target, Self::Materializing | Self::Failed),
            Self::Materializing => matches!(target, Self::Succeeded | Self::Failed),
            Self::Failed => matches!(target, Self::Retrying),
            Self::Retrying => target.is_stage(),
            Self::Succeeded => false,
        }
    }

    /// Returns a lowercase label suitable for logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Preprocessing => "preprocessing",
            Self::Staging => "staging",
            Self::Registering => "registering",
            Self::Materializing => "materializing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

// ============================================================================
// Stage Kind
// ============================================================================

/// The five pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Download,
    Preprocess,
    Upload,
    Register,
    Materialize,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Download,
        StageKind::Preprocess,
        StageKind::Upload,
        StageKind::Register,
        StageKind::Materialize,
    ];

    /// Run state while this stage executes
    pub const fn state(&self) -> RunState {
        match self {
            Self::Download => RunState::Downloading,
            Self::Preprocess => RunState::Preprocessing,
            Self::Upload => RunState::Staging,
            Self::Register => RunState::Registering,
            Self::Materialize => RunState::Materializing,
        }
    }

    /// Stable task id used in logs and reports
    pub const fn task_id(&self) -> &'static str {
        match self {
            Self::Download => "download_taxi_data",
            Self::Preprocess => "preprocess_data",
            Self::Upload => "upload_to_gcs",
            Self::Register => "create_external_table",
            Self::Materialize => "create_optimized_table",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_id())
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Whole-stage retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retries: u32,
    /// Fixed wait before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Whether a stage that just failed on `attempt` (1-based) may run again
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.retries
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.retries, config.delay())
    }
}

// ============================================================================
// Transition Log
// ============================================================================

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: RunState,
    pub to: RunState,
    pub at: DateTime<Utc>,
    /// Attempt number of the current stage (0 before the first stage)
    pub attempt: u32,
}

/// Validates and records every state change of a run
#[derive(Debug, Clone)]
pub struct RunTracker {
    state: RunState,
    stage: Option<StageKind>,
    attempt: u32,
    transitions: Vec<Transition>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    /// A fresh run in `Pending`
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
            stage: None,
            attempt: 0,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Stage currently running, or the one that failed last
    pub fn stage(&self) -> Option<StageKind> {
        self.stage
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Enter the first attempt of `stage`
    pub fn begin_stage(&mut self, stage: StageKind) -> Result<()> {
        let previous = (self.stage, self.attempt);
        self.stage = Some(stage);
        self.attempt = 1;
        if let Err(e) = self.transition(stage.state()) {
            (self.stage, self.attempt) = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Move to `to`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, to: RunState) -> Result<()> {
        let allowed = self.state.can_transition_to(to)
            && match (self.state, to) {
                (RunState::Retrying, target) => self.stage.map(|s| s.state()) == Some(target),
                (_, target) if target.is_stage() => self.stage.map(|s| s.state()) == Some(target),
                _ => true,
            };

        if !allowed {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        if to == RunState::Retrying {
            self.attempt += 1;
        }

        self.transitions.push(Transition {
            from: self.state,
            to,
            at: Utc::now(),
            attempt: self.attempt,
        });
        self.state = to;
        Ok(())
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// What each stage produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub fetched: Vec<FetchedFile>,
    pub cleaned: Vec<CleanReport>,
    pub staged: Vec<StagedObject>,
    pub external_table: Option<String>,
    pub materialization: Option<JobSummary>,
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: RunState,
    pub transitions: Vec<Transition>,
    /// Stage that failed, if any
    pub failed_stage: Option<StageKind>,
    /// Originating error of a failed run
    pub error: Option<Error>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == RunState::Succeeded
    }

    /// Number of attempts made for `stage`
    pub fn attempts(&self, stage: StageKind) -> u32 {
        self.transitions
            .iter()
            .filter(|t| t.to == stage.state())
            .count() as u32
    }

    /// States visited, starting with `Pending`
    pub fn states(&self) -> Vec<RunState> {
        std::iter::once(RunState::Pending)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// JSON rendering for the CLI
    pub fn to_json(&self) -> Value {
        json!({
            "run_id": self.run_id,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "final_state": self.final_state,
            "failed_stage": self.failed_stage,
            "error": self.error.as_ref().map(|e| json!({
                "kind": e.kind(),
                "message": e.to_string(),
            })),
            "transitions": self.transitions,
            "summary": self.summary,
        })
    }
}
