//! Permission gate backed by the tracker repository.

use crate::tracker::{
    domain::{ProjectId, Role, UserId},
    ports::{PermissionGate, PermissionGateError, PermissionGateResult, TrackerRepository},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Grants project permission to the owner and to members holding the
/// manager role.
#[derive(Debug, Clone)]
pub struct RepositoryPermissionGate<R: TrackerRepository> {
    repository: Arc<R>,
}

impl<R: TrackerRepository> RepositoryPermissionGate<R> {
    /// Creates a gate reading projects and users from `repository`.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: TrackerRepository> PermissionGate for RepositoryPermissionGate<R> {
    async fn has_project_permission(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> PermissionGateResult<bool> {
        let Some(project) = self
            .repository
            .find_project(project_id)
            .await
            .map_err(PermissionGateError::lookup)?
        else {
            return Ok(false);
        };

        if project.owner_id() == user_id {
            return Ok(true);
        }
        if !project.members().contains(&user_id) {
            return Ok(false);
        }

        let user = self
            .repository
            .find_user(user_id)
            .await
            .map_err(PermissionGateError::lookup)?;
        Ok(user.is_some_and(|member| member.role() == Role::Manager))
    }
}
