//! Domain model for the task dependency and sprint lifecycle engine.
//!
//! Tasks, sprints, and projects are plain aggregates that validate their own
//! moves. Everything that needs more than one aggregate (dependency checks,
//! launch gating, expiration) is coordinated by the services layer.

mod dependency;
mod error;
mod ids;
mod project;
mod sprint;
mod status;
mod task;

pub use dependency::DependencyGraph;
pub use error::{
    ParseDependencyTypeError, ParseRoleError, ParseTaskStatusError, TrackerDomainError,
};
pub use ids::{EntityRef, EpicId, ProjectId, Revision, SprintId, TaskId, UserId};
pub use project::{PersistedProjectData, Project, Role, User};
pub use sprint::{PersistedSprintData, Sprint, SprintDuration, SprintName, SprintState};
pub use status::{DependencyType, TaskStatus};
pub use task::{PersistedTaskData, Task, TaskName, TaskTransitionRecord};
