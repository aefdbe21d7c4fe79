//! Lookups and guards shared by the tracker services.

use super::error::{Denial, Precondition, TrackerServiceError, TrackerServiceResult};
use crate::tracker::{
    domain::{EntityRef, Project, ProjectId, Sprint, SprintId, Task, TaskId, User, UserId},
    ports::{PermissionGate, TrackerRepository},
};

pub(super) async fn require_task<R: TrackerRepository>(
    repository: &R,
    id: TaskId,
) -> TrackerServiceResult<Task> {
    repository
        .find_task(id)
        .await?
        .ok_or(TrackerServiceError::NotFound(EntityRef::Task(id)))
}

pub(super) async fn require_sprint<R: TrackerRepository>(
    repository: &R,
    id: SprintId,
) -> TrackerServiceResult<Sprint> {
    repository
        .find_sprint(id)
        .await?
        .ok_or(TrackerServiceError::NotFound(EntityRef::Sprint(id)))
}

pub(super) async fn require_project<R: TrackerRepository>(
    repository: &R,
    id: ProjectId,
) -> TrackerServiceResult<Project> {
    repository
        .find_project(id)
        .await?
        .ok_or(TrackerServiceError::NotFound(EntityRef::Project(id)))
}

pub(super) async fn require_user<R: TrackerRepository>(
    repository: &R,
    id: UserId,
) -> TrackerServiceResult<User> {
    repository
        .find_user(id)
        .await?
        .ok_or(TrackerServiceError::NotFound(EntityRef::User(id)))
}

/// Returns the task's sprint when it is active.
pub(super) async fn active_sprint_of<R: TrackerRepository>(
    repository: &R,
    task: &Task,
) -> TrackerServiceResult<Option<Sprint>> {
    let Some(sprint_id) = task.sprint_id() else {
        return Ok(None);
    };
    Ok(repository
        .find_sprint(sprint_id)
        .await?
        .filter(Sprint::is_active))
}

pub(super) async fn ensure_project_permission<P: PermissionGate>(
    permissions: &P,
    user_id: UserId,
    project_id: ProjectId,
) -> TrackerServiceResult<()> {
    if permissions
        .has_project_permission(user_id, project_id)
        .await?
    {
        Ok(())
    } else {
        Err(TrackerServiceError::Forbidden(Denial::NotProjectManager {
            user_id,
            project_id,
        }))
    }
}

pub(super) fn ensure_participant(project: &Project, user_id: UserId) -> TrackerServiceResult<()> {
    if project.has_participant(user_id) {
        Ok(())
    } else {
        Err(Precondition::WorkerNotInProject {
            user_id,
            project_id: project.id(),
        }
        .into())
    }
}

pub(super) fn ensure_task_in_project(task: &Task, project_id: ProjectId) -> TrackerServiceResult<()> {
    if task.project_id() == project_id {
        Ok(())
    } else {
        Err(Precondition::TaskOutsideProject {
            task_id: task.id(),
            project_id,
        }
        .into())
    }
}

pub(super) fn ensure_sprint_in_project(
    sprint: &Sprint,
    project_id: ProjectId,
) -> TrackerServiceResult<()> {
    if sprint.project_id() == project_id {
        Ok(())
    } else {
        Err(Precondition::SprintOutsideProject {
            sprint_id: sprint.id(),
            project_id,
        }
        .into())
    }
}
