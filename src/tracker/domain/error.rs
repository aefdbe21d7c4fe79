//! Error types for tracker domain validation and parsing.

use super::{SprintId, SprintState, TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating tracker domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerDomainError {
    /// The task name is outside the accepted length range after trimming.
    #[error("task name must be between 3 and 100 characters: '{0}'")]
    InvalidTaskName(String),

    /// The sprint name is outside the accepted length range after trimming.
    #[error("sprint name must be between 3 and 100 characters: '{0}'")]
    InvalidSprintName(String),

    /// The project name is empty after trimming.
    #[error("project name must not be empty")]
    EmptyProjectName,

    /// The username is empty after trimming.
    #[error("username must not be empty")]
    EmptyUsername,

    /// Sprint durations are limited to one through four weeks.
    #[error("invalid sprint duration of {0} weeks, expected 1 to 4")]
    InvalidSprintDuration(u8),

    /// The task status machine does not allow the requested move.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTaskTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Worker and reviewer transitions require the task's sprint to be active.
    #[error("task {task_id} is not part of an active sprint")]
    TaskSprintNotActive {
        /// Task identifier.
        task_id: TaskId,
    },

    /// The sprint lifecycle does not allow the requested move.
    #[error("sprint {sprint_id} cannot move from {from} to {to}")]
    InvalidSprintTransition {
        /// Sprint identifier.
        sprint_id: SprintId,
        /// Current lifecycle state.
        from: SprintState,
        /// Requested lifecycle state.
        to: SprintState,
    },

    /// The project has already been marked complete.
    #[error("project is already complete")]
    ProjectAlreadyComplete,
}

impl TrackerDomainError {
    /// Returns `true` when the error is a rejected lifecycle move rather than
    /// an input validation failure.
    #[must_use]
    pub const fn is_transition(&self) -> bool {
        matches!(
            self,
            Self::InvalidTaskTransition { .. }
                | Self::TaskSprintNotActive { .. }
                | Self::InvalidSprintTransition { .. }
        )
    }
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing dependency types from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown dependency type: {0}")]
pub struct ParseDependencyTypeError(pub String);

/// Error returned while parsing user roles from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);
