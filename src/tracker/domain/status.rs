//! Task status machine and dependency kinds.

use super::{ParseDependencyTypeError, ParseTaskStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task exists but is not part of a launched sprint.
    NotAvailable,
    /// Task is in an active sprint and ready to be picked up.
    Available,
    /// Task is in an active sprint but blocked on its prerequisite.
    Wait,
    /// The assigned worker is implementing the task.
    InProgress,
    /// The task has been submitted for review.
    Testing,
    /// A reviewer sent the task back to the worker.
    Feedback,
    /// A reviewer accepted the task.
    Complete,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::NotAvailable,
        Self::Available,
        Self::Wait,
        Self::InProgress,
        Self::Testing,
        Self::Feedback,
        Self::Complete,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotAvailable => "not_available",
            Self::Available => "available",
            Self::Wait => "wait",
            Self::InProgress => "in_progress",
            Self::Testing => "testing",
            Self::Feedback => "feedback",
            Self::Complete => "complete",
        }
    }

    /// Returns whether the status machine permits moving to `target`.
    ///
    /// Re-evaluation moves (`NotAvailable`/`Wait`/`Available` into
    /// `Available`/`Wait`) are included so that dependency propagation and
    /// sprint launches go through the same table as worker actions.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::NotAvailable | Self::Wait => matches!(target, Self::Available | Self::Wait),
            Self::Available => {
                matches!(target, Self::Available | Self::Wait | Self::InProgress)
            }
            Self::InProgress => matches!(target, Self::Testing),
            Self::Testing => matches!(target, Self::Feedback | Self::Complete),
            Self::Feedback => matches!(target, Self::InProgress),
            Self::Complete => false,
        }
    }

    /// Returns whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns whether the task is waiting on, or being handled by, a
    /// reviewer.
    #[must_use]
    pub const fn is_under_review(self) -> bool {
        matches!(self, Self::Testing | Self::Feedback)
    }

    /// Returns whether work on the task has begun.
    #[must_use]
    pub const fn has_started(self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::Testing | Self::Feedback | Self::Complete
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "not_available" => Ok(Self::NotAvailable),
            "available" => Ok(Self::Available),
            "wait" => Ok(Self::Wait),
            "in_progress" => Ok(Self::InProgress),
            "testing" => Ok(Self::Testing),
            "feedback" => Ok(Self::Feedback),
            "complete" => Ok(Self::Complete),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// How a dependent task relates to its prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DependencyType {
    /// No constraint.
    #[default]
    #[serde(rename = "none")]
    None,
    /// The dependent may proceed once the prerequisite is complete.
    #[serde(rename = "fs")]
    FinishToStart,
    /// The dependent may proceed once the prerequisite has started.
    #[serde(rename = "ss")]
    StartToStart,
}

impl DependencyType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FinishToStart => "fs",
            Self::StartToStart => "ss",
        }
    }

    /// Returns whether a prerequisite in `status` unblocks a dependent of
    /// this kind.
    #[must_use]
    pub const fn is_satisfied_by(self, status: TaskStatus) -> bool {
        match self {
            Self::None => true,
            Self::FinishToStart => status.is_terminal(),
            Self::StartToStart => status.has_started(),
        }
    }

    /// Returns the status change in a prerequisite that should wake
    /// dependents of this kind, if any.
    #[must_use]
    pub const fn trigger_status(self) -> Option<TaskStatus> {
        match self {
            Self::None => None,
            Self::FinishToStart => Some(TaskStatus::Complete),
            Self::StartToStart => Some(TaskStatus::InProgress),
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DependencyType {
    type Error = ParseDependencyTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" | "" => Ok(Self::None),
            "fs" | "finish_to_start" => Ok(Self::FinishToStart),
            "ss" | "start_to_start" => Ok(Self::StartToStart),
            _ => Err(ParseDependencyTypeError(value.to_owned())),
        }
    }
}
