//! Application services for the tracker.

mod error;
mod expiration;
mod project;
mod sprint_scheduler;
mod support;
mod task_workflow;

pub use error::{
    Denial, DependencyViolation, Precondition, TrackerServiceError, TrackerServiceResult,
};
pub use expiration::{ExpirationReport, SprintExpirationMonitor};
pub use project::ProjectService;
pub use sprint_scheduler::{CreateSprintRequest, ExpiredSprint, SprintSchedulerService};
pub use task_workflow::{CreateTaskRequest, TaskWorkflowService};
