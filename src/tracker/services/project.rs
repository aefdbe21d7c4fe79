//! Project close-out.

use super::{
    error::{Precondition, TrackerServiceResult},
    support::{ensure_project_permission, require_project},
};
use crate::tracker::{
    domain::{Project, ProjectId, TaskStatus, UserId},
    ports::{ChangeSet, PermissionGate, TrackerRepository},
};
use std::sync::Arc;
use tracing::info;

/// Project-level operations.
#[derive(Clone)]
pub struct ProjectService<R, P>
where
    R: TrackerRepository,
    P: PermissionGate,
{
    repository: Arc<R>,
    permissions: Arc<P>,
}

impl<R, P> ProjectService<R, P>
where
    R: TrackerRepository,
    P: PermissionGate,
{
    /// Creates a new project service.
    #[must_use]
    pub const fn new(repository: Arc<R>, permissions: Arc<P>) -> Self {
        Self {
            repository,
            permissions,
        }
    }

    /// Marks a project complete once every task in it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`super::TrackerServiceError::PreconditionFailed`] while tasks
    /// remain open and [`super::TrackerServiceError::Validation`] when the
    /// project is already complete.
    pub async fn complete_project(
        &self,
        actor: UserId,
        project_id: ProjectId,
    ) -> TrackerServiceResult<Project> {
        let mut project = require_project(&*self.repository, project_id).await?;
        ensure_project_permission(&*self.permissions, actor, project_id).await?;

        let open = self
            .repository
            .find_tasks_by_project(project_id)
            .await?
            .iter()
            .filter(|task| task.status() != TaskStatus::Complete)
            .count();
        if open > 0 {
            return Err(Precondition::ProjectHasOpenTasks { project_id, open }.into());
        }

        project.mark_complete()?;
        let mut changes = ChangeSet::new();
        changes.update_project(&mut project);
        self.repository.commit(changes).await?;

        info!(project_id = %project_id, "project completed");
        Ok(project)
    }

    /// Finds a project by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`super::TrackerServiceError::Repository`] when the lookup
    /// fails.
    pub async fn find_project(&self, project_id: ProjectId) -> TrackerServiceResult<Option<Project>> {
        Ok(self.repository.find_project(project_id).await?)
    }
}
