//! Failure taxonomy surfaced to callers of tracker services.

use crate::tracker::{
    domain::{
        EntityRef, ProjectId, SprintId, SprintState, TaskId, TaskStatus, TrackerDomainError,
        UserId,
    },
    ports::{PermissionGateError, TrackerRepositoryError},
};
use std::fmt;
use thiserror::Error;

/// Why a caller was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Denial {
    /// The caller neither owns nor manages the project.
    #[error("user {user_id} may not manage project {project_id}")]
    NotProjectManager {
        /// Caller.
        user_id: UserId,
        /// Project acted upon.
        project_id: ProjectId,
    },

    /// Worker transitions are reserved for the assigned worker.
    #[error("user {user_id} is not the assigned worker of task {task_id}")]
    NotAssignedWorker {
        /// Caller.
        user_id: UserId,
        /// Task acted upon.
        task_id: TaskId,
    },

    /// Review transitions are reserved for testers.
    #[error("user {user_id} does not hold the tester role")]
    NotTester {
        /// Caller.
        user_id: UserId,
    },
}

/// A business rule that blocked an otherwise well-formed request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Precondition {
    /// The sprint does not hold enough tasks to launch.
    #[error("sprint {sprint_id} holds {found} tasks, at least {required} are needed to launch")]
    InsufficientTasks {
        /// Sprint being launched.
        sprint_id: SprintId,
        /// Tasks currently in the sprint.
        found: usize,
        /// Minimum required.
        required: usize,
    },

    /// Some sprint tasks have nobody assigned.
    #[error("sprint {sprint_id} has {} tasks without a worker", tasks.len())]
    UnassignedWorkers {
        /// Sprint being launched.
        sprint_id: SprintId,
        /// Tasks without a worker.
        tasks: Vec<TaskId>,
    },

    /// The sprint has been closed out.
    #[error("sprint {0} is completed")]
    SprintCompleted(SprintId),

    /// Membership changes need a draft sprint.
    #[error("sprint {sprint_id} is {state}, membership can only change while it is a draft")]
    SprintNotDraft {
        /// Sprint acted upon.
        sprint_id: SprintId,
        /// Its current state.
        state: SprintState,
    },

    /// Active sprints cannot be deleted.
    #[error("sprint {0} is active")]
    SprintActive(SprintId),

    /// The sprint belongs to another project.
    #[error("sprint {sprint_id} does not belong to project {project_id}")]
    SprintOutsideProject {
        /// Sprint referenced.
        sprint_id: SprintId,
        /// Project expected.
        project_id: ProjectId,
    },

    /// The task belongs to another project.
    #[error("task {task_id} does not belong to project {project_id}")]
    TaskOutsideProject {
        /// Task referenced.
        task_id: TaskId,
        /// Project expected.
        project_id: ProjectId,
    },

    /// Completed tasks cannot be scheduled again.
    #[error("task {0} is already complete")]
    TaskAlreadyComplete(TaskId),

    /// The task is scheduled in a different sprint.
    #[error("task {task_id} already belongs to sprint {sprint_id}")]
    TaskInOtherSprint {
        /// Task referenced.
        task_id: TaskId,
        /// Sprint currently holding it.
        sprint_id: SprintId,
    },

    /// The task is not part of the sprint.
    #[error("task {task_id} is not part of sprint {sprint_id}")]
    TaskNotInSprint {
        /// Task referenced.
        task_id: TaskId,
        /// Sprint referenced.
        sprint_id: SprintId,
    },

    /// Workers must participate in the project.
    #[error("user {user_id} is not a member of project {project_id}")]
    WorkerNotInProject {
        /// Proposed worker.
        user_id: UserId,
        /// Project of the task.
        project_id: ProjectId,
    },

    /// A project completes only once all of its tasks have.
    #[error("project {project_id} still has {open} incomplete tasks")]
    ProjectHasOpenTasks {
        /// Project being completed.
        project_id: ProjectId,
        /// Tasks not yet complete.
        open: usize,
    },
}

/// A sprint task whose prerequisite will not be available during the sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyViolation {
    /// Dependent task inside the sprint.
    pub task_id: TaskId,
    /// Its prerequisite.
    pub prerequisite: TaskId,
    /// Prerequisite status, or `None` when the prerequisite no longer exists.
    pub prerequisite_status: Option<TaskStatus>,
}

impl fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prerequisite_status {
            Some(status) => write!(
                f,
                "task {} depends on {} ({status}) outside the sprint",
                self.task_id, self.prerequisite
            ),
            None => write!(
                f,
                "task {} depends on missing task {}",
                self.task_id, self.prerequisite
            ),
        }
    }
}

/// Service-level errors for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerServiceError {
    /// A referenced task, sprint, project, or user does not exist.
    #[error("{0} not found")]
    NotFound(EntityRef),

    /// The caller is not allowed to perform the operation.
    #[error(transparent)]
    Forbidden(Denial),

    /// A task or sprint lifecycle guard rejected the move.
    #[error(transparent)]
    InvalidTransition(TrackerDomainError),

    /// The dependency edit would close a loop.
    #[error("making task {task_id} depend on {prerequisite} would create a cycle")]
    CircularDependency {
        /// Task being edited.
        task_id: TaskId,
        /// Proposed prerequisite.
        prerequisite: TaskId,
    },

    /// Sprint launch found prerequisites that will not be available.
    #[error("sprint {sprint_id} cannot launch: {} dependency violations", violations.len())]
    DependencyValidationFailed {
        /// Sprint being launched.
        sprint_id: SprintId,
        /// Every offending task.
        violations: Vec<DependencyViolation>,
    },

    /// The project already has an uncompleted sprint.
    #[error("project {0} already has an uncompleted sprint")]
    SprintConflict(ProjectId),

    /// A business precondition failed.
    #[error(transparent)]
    PreconditionFailed(#[from] Precondition),

    /// Input validation failed.
    #[error(transparent)]
    Validation(TrackerDomainError),

    /// The permission gate could not answer.
    #[error(transparent)]
    Permission(#[from] PermissionGateError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(TrackerRepositoryError),
}

impl From<TrackerDomainError> for TrackerServiceError {
    fn from(err: TrackerDomainError) -> Self {
        if err.is_transition() {
            Self::InvalidTransition(err)
        } else {
            Self::Validation(err)
        }
    }
}

impl From<TrackerRepositoryError> for TrackerServiceError {
    fn from(err: TrackerRepositoryError) -> Self {
        match err {
            TrackerRepositoryError::OpenSprintExists(project_id) => {
                Self::SprintConflict(project_id)
            }
            other => Self::Repository(other),
        }
    }
}

/// Result type for tracker service operations.
pub type TrackerServiceResult<T> = Result<T, TrackerServiceError>;
