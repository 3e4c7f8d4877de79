//! Flow report: one record per attempted transition.

use crate::flow::FlowState;
use crate::observation::Observation;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Observation confirmed
    Passed,
    /// Action or confirmation failed
    Failed,
}

impl StepStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Record of one transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// State being entered
    pub state: FlowState,
    /// Outcome
    pub status: StepStatus,
    /// Time spent acting and confirming
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    /// Confirming observation
    pub observation: Option<Observation>,
    /// Error message if failed
    pub error: Option<String>,
}

/// Record of one flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    /// Unique run id
    pub run_id: Uuid,
    /// Landing URL
    pub base_url: String,
    /// Steps in the order attempted
    pub steps: Vec<StepRecord>,
    /// Last state reached
    pub final_state: FlowState,
    /// Failure message, if the run failed
    pub failure: Option<String>,
}

impl FlowReport {
    /// Empty report for a run against `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            base_url: base_url.into(),
            steps: Vec::new(),
            final_state: FlowState::LoggedOut,
            failure: None,
        }
    }

    /// Record a confirmed transition
    pub fn record_pass(&mut self, state: FlowState, elapsed: Duration, observation: Observation) {
        self.steps.push(StepRecord {
            state,
            status: StepStatus::Passed,
            elapsed,
            observation: Some(observation),
            error: None,
        });
        self.final_state = state;
    }

    /// Record a failed transition
    pub fn record_failure(&mut self, state: FlowState, elapsed: Duration, error: &ProbeError) {
        self.steps.push(StepRecord {
            state,
            status: StepStatus::Failed,
            elapsed,
            observation: None,
            error: Some(error.to_string()),
        });
    }

    /// Close the report with the final state and error, if any
    pub fn finish(&mut self, state: FlowState, error: Option<&ProbeError>) {
        self.final_state = state;
        self.failure = error.map(ToString::to_string);
    }

    /// Whether every recorded step passed and the run did not fail
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.steps.iter().all(|s| s.status.is_passed())
    }

    /// Number of confirmed steps
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_passed()).count()
    }

    /// The failed step, if any
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| !s.status.is_passed())
    }

    /// Total time across steps
    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} steps passed, reached {}",
            self.run_id,
            self.passed_count(),
            self.steps.len(),
            self.final_state
        )
    }

    /// Pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn write_json(&self, output_path: &Path) -> ProbeResult<()> {
        std::fs::write(output_path, self.to_json()?)?;
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
