//! Encode jobs and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle state.
///
/// `Queued → Scheduled → Processing → {Finished, Error, Canceled}`, with
/// the transient `Canceling` reachable from any active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for capacity in the region.
    Queued,
    /// Assigned to an encoder, not yet running.
    Scheduled,
    /// Encoding.
    Processing,
    /// Cancellation requested, not yet effective.
    Canceling,
    /// Completed successfully.
    Finished,
    /// Ended in failure.
    Error,
    /// Cancellation took effect.
    Canceled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Processing => write!(f, "processing"),
            Self::Canceling => write!(f, "canceling"),
            Self::Finished => write!(f, "finished"),
            Self::Error => write!(f, "error"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl JobState {
    /// Check if no further transition can occur from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Canceled)
    }

    /// Check if the job is still making progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Scheduled | Self::Processing | Self::Canceling
        )
    }

    /// Check if this state can transition to another state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match (self, next) {
            // Forward progress
            (Self::Queued, Self::Scheduled) => true,
            (Self::Scheduled, Self::Processing) => true,
            (Self::Processing, Self::Finished) => true,
            (Self::Processing, Self::Error) => true,
            // Failures can surface before processing starts
            (Self::Queued, Self::Error) => true,
            (Self::Scheduled, Self::Error) => true,
            // Canceling is reachable from any active state
            (state, Self::Canceling) if state.is_active() && *state != Self::Canceling => true,
            (Self::Canceling, Self::Canceled) => true,
            // No other transitions allowed
            _ => false,
        }
    }
}

/// One observed state change, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTransition {
    /// State before the change.
    pub previous: JobState,
    /// State after the change.
    pub current: JobState,
}

/// The single encode task attached to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task display name.
    pub name: String,
    /// Processor executing the task.
    pub processor_name: String,
    /// Encode profile handed to the processor.
    pub profile: String,
    /// Input asset id.
    pub input_asset_id: String,
    /// Output asset id, created fresh at submission.
    pub output_asset_id: String,
}

/// A unit of encode work bound to one region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Job display name.
    pub name: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// The job's tasks, in order. Exactly one in this system.
    pub tasks: Vec<Task>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a freshly queued job.
    pub fn new(name: impl Into<String>, task: Task) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            state: JobState::Queued,
            tasks: vec![task],
            created_at: Utc::now(),
        }
    }

    /// The job's first (and only) task.
    pub fn task(&self) -> &Task {
        &self.tasks[0]
    }

    /// Id of the first task's output asset.
    pub fn output_asset_id(&self) -> &str {
        &self.task().output_asset_id
    }
}
