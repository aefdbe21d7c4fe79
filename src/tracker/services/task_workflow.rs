//! Task workflow: creation, dependency edits, status moves, and deletion.

use super::{
    error::{Denial, Precondition, TrackerServiceError, TrackerServiceResult},
    support::{
        active_sprint_of, ensure_participant, ensure_project_permission, ensure_sprint_in_project,
        ensure_task_in_project, require_project, require_sprint, require_task, require_user,
    },
};
use crate::tracker::{
    domain::{
        DependencyGraph, DependencyType, EpicId, ProjectId, Role, SprintId, Task, TaskId,
        TaskName, TaskStatus, TaskTransitionRecord, TrackerDomainError, UserId,
    },
    ports::{ChangeSet, PermissionGate, TrackerRepository},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info};

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    project_id: ProjectId,
    name: String,
    priority: u8,
    epic_id: Option<EpicId>,
    dependency: Option<(TaskId, DependencyType)>,
    worker_id: Option<UserId>,
    sprint_id: Option<SprintId>,
}

impl CreateTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project_id,
            name: name.into(),
            priority: 0,
            epic_id: None,
            dependency: None,
            worker_id: None,
            sprint_id: None,
        }
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Groups the task under an epic.
    #[must_use]
    pub const fn with_epic(mut self, epic_id: EpicId) -> Self {
        self.epic_id = Some(epic_id);
        self
    }

    /// Makes the task depend on `prerequisite`.
    #[must_use]
    pub const fn with_dependency(mut self, prerequisite: TaskId, kind: DependencyType) -> Self {
        self.dependency = Some((prerequisite, kind));
        self
    }

    /// Assigns a worker up front.
    #[must_use]
    pub const fn with_worker(mut self, worker_id: UserId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Places the task in a sprint up front.
    #[must_use]
    pub const fn in_sprint(mut self, sprint_id: SprintId) -> Self {
        self.sprint_id = Some(sprint_id);
        self
    }
}

/// Who may drive a status move.
#[derive(Debug, Clone, Copy)]
enum Mover {
    AssignedWorker,
    Tester,
}

/// Task workflow orchestration service.
///
/// Status moves are only legal while the task sits in an active sprint.
/// Starting or completing a task releases its waiting dependents in the
/// same commit.
#[derive(Clone)]
pub struct TaskWorkflowService<R, P, C>
where
    R: TrackerRepository,
    P: PermissionGate,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    permissions: Arc<P>,
    clock: Arc<C>,
}

impl<R, P, C> TaskWorkflowService<R, P, C>
where
    R: TrackerRepository,
    P: PermissionGate,
    C: Clock + Send + Sync,
{
    /// Creates a new task workflow service.
    #[must_use]
    pub const fn new(repository: Arc<R>, permissions: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            repository,
            permissions,
            clock,
        }
    }

    /// Creates a task in `NotAvailable`.
    ///
    /// A task created straight into an active sprint is evaluated at once
    /// and lands in `Available` or `Wait` with a transition record.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Forbidden`] without project permission,
    /// [`TrackerServiceError::Validation`] for a bad name,
    /// [`TrackerServiceError::NotFound`] for unknown references, or
    /// [`TrackerServiceError::PreconditionFailed`] when a reference belongs
    /// elsewhere or the sprint is completed.
    pub async fn create_task(
        &self,
        actor: UserId,
        request: CreateTaskRequest,
    ) -> TrackerServiceResult<Task> {
        let project = require_project(&*self.repository, request.project_id).await?;
        ensure_project_permission(&*self.permissions, actor, project.id()).await?;

        let name = TaskName::new(request.name)?;
        let mut task = Task::new(project.id(), name, request.priority, &*self.clock);
        if let Some(epic_id) = request.epic_id {
            task = task.with_epic(epic_id);
        }
        if let Some(worker_id) = request.worker_id {
            ensure_participant(&project, worker_id)?;
            task.assign_worker(Some(worker_id), &*self.clock);
        }

        let mut graph = DependencyGraph::default();
        if let Some((prerequisite_id, kind)) = request.dependency {
            let prerequisite = require_task(&*self.repository, prerequisite_id).await?;
            ensure_task_in_project(&prerequisite, project.id())?;
            graph.insert(&prerequisite);
            task.set_dependency(Some(prerequisite_id), kind, &*self.clock);
        }

        let mut record = None;
        let mut target_sprint = None;
        if let Some(sprint_id) = request.sprint_id {
            let sprint = require_sprint(&*self.repository, sprint_id).await?;
            ensure_sprint_in_project(&sprint, project.id())?;
            if sprint.is_completed() {
                return Err(Precondition::SprintCompleted(sprint_id).into());
            }
            task.join_sprint(sprint_id, &*self.clock);
            if sprint.is_active() {
                record = task.reevaluate_for_launch(graph.is_satisfied(&task), &*self.clock);
            }
            target_sprint = Some(sprint);
        }

        let mut changes = ChangeSet::new();
        changes.insert_task(&task);
        if let Some(entry) = record {
            changes.record(entry);
        }
        if let Some(sprint) = target_sprint.as_mut() {
            changes.touch_sprint(sprint);
        }
        self.repository.commit(changes).await?;

        info!(
            task_id = %task.id(),
            project_id = %project.id(),
            status = %task.status(),
            "task created"
        );
        Ok(task)
    }

    /// Assigns or unassigns the task's worker.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Forbidden`] without project permission
    /// or [`TrackerServiceError::PreconditionFailed`] when the worker does
    /// not participate in the project.
    pub async fn assign_worker(
        &self,
        actor: UserId,
        task_id: TaskId,
        worker_id: Option<UserId>,
    ) -> TrackerServiceResult<Task> {
        let mut task = require_task(&*self.repository, task_id).await?;
        let project = require_project(&*self.repository, task.project_id()).await?;
        ensure_project_permission(&*self.permissions, actor, project.id()).await?;
        if let Some(worker) = worker_id {
            ensure_participant(&project, worker)?;
        }

        task.assign_worker(worker_id, &*self.clock);
        let mut changes = ChangeSet::new();
        changes.update_task(&mut task);
        self.repository.commit(changes).await?;
        debug!(task_id = %task_id, worker_id = ?worker_id, "task worker assigned");
        Ok(task)
    }

    /// Replaces the task's prerequisite relation.
    ///
    /// Passing no prerequisite or [`DependencyType::None`] clears it. When
    /// the task waits or is available in an active sprint, its status is
    /// brought in line with the new prerequisite.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::CircularDependency`] when the edit
    /// would close a loop (self-dependency included); nothing is written in
    /// that case.
    pub async fn update_dependency(
        &self,
        actor: UserId,
        task_id: TaskId,
        prerequisite: Option<TaskId>,
        kind: DependencyType,
    ) -> TrackerServiceResult<Task> {
        let mut task = require_task(&*self.repository, task_id).await?;
        ensure_project_permission(&*self.permissions, actor, task.project_id()).await?;

        let project_tasks = self
            .repository
            .find_tasks_by_project(task.project_id())
            .await?;
        let graph = DependencyGraph::from_tasks(&project_tasks);

        if let Some(prerequisite_id) = prerequisite.filter(|_| kind != DependencyType::None) {
            if prerequisite_id != task_id {
                let candidate = require_task(&*self.repository, prerequisite_id).await?;
                ensure_task_in_project(&candidate, task.project_id())?;
            }
            if graph.has_cycle(task_id, prerequisite_id) {
                return Err(TrackerServiceError::CircularDependency {
                    task_id,
                    prerequisite: prerequisite_id,
                });
            }
        }

        task.set_dependency(prerequisite, kind, &*self.clock);
        let mut changes = ChangeSet::new();
        if active_sprint_of(&*self.repository, &task).await?.is_some() {
            if let Some(record) = settle_waiting(&mut task, &graph, &*self.clock)? {
                changes.record(record);
            }
        }
        changes.update_task(&mut task);
        self.repository.commit(changes).await?;

        debug!(
            task_id = %task_id,
            prerequisite = ?task.dependent_on(),
            dependency_type = %task.dependency_type(),
            "task dependency updated"
        );
        Ok(task)
    }

    /// Moves an available task to `InProgress`, releasing start-to-start
    /// dependents.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Forbidden`] unless `actor` is the
    /// assigned worker, or [`TrackerServiceError::InvalidTransition`] when
    /// the sprint is not active or the move is not allowed.
    pub async fn start_task(&self, actor: UserId, task_id: TaskId) -> TrackerServiceResult<Task> {
        self.advance(actor, task_id, TaskStatus::InProgress, Mover::AssignedWorker)
            .await
    }

    /// Hands an in-progress task over for testing.
    ///
    /// # Errors
    ///
    /// As [`Self::start_task`].
    pub async fn mark_testing(&self, actor: UserId, task_id: TaskId) -> TrackerServiceResult<Task> {
        self.advance(actor, task_id, TaskStatus::Testing, Mover::AssignedWorker)
            .await
    }

    /// Sends a task under test back with feedback.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Forbidden`] unless `actor` is a tester,
    /// or [`TrackerServiceError::InvalidTransition`] when the sprint is not
    /// active or the move is not allowed.
    pub async fn mark_feedback(
        &self,
        actor: UserId,
        task_id: TaskId,
    ) -> TrackerServiceResult<Task> {
        self.advance(actor, task_id, TaskStatus::Feedback, Mover::Tester)
            .await
    }

    /// Accepts a task under test, releasing finish-to-start dependents.
    ///
    /// # Errors
    ///
    /// As [`Self::mark_feedback`].
    pub async fn mark_complete(
        &self,
        actor: UserId,
        task_id: TaskId,
    ) -> TrackerServiceResult<Task> {
        self.advance(actor, task_id, TaskStatus::Complete, Mover::Tester)
            .await
    }

    /// Deletes a task and detaches its dependents.
    ///
    /// Dependents lose their prerequisite. Those waiting in an active sprint
    /// become `Available`. The task's transition history goes with it.
    /// Returns the updated dependents.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Forbidden`] without project permission
    /// or [`TrackerServiceError::NotFound`] for an unknown task.
    pub async fn delete_task(
        &self,
        actor: UserId,
        task_id: TaskId,
    ) -> TrackerServiceResult<Vec<Task>> {
        let task = require_task(&*self.repository, task_id).await?;
        ensure_project_permission(&*self.permissions, actor, task.project_id()).await?;

        let mut changes = ChangeSet::new();
        let mut detached = Vec::new();
        for mut dependent in self.repository.find_dependents(task_id).await? {
            dependent.clear_dependency(&*self.clock);
            if active_sprint_of(&*self.repository, &dependent).await?.is_some() {
                if let Some(record) = dependent.unblock(&*self.clock) {
                    changes.record(record);
                }
            }
            changes.update_task(&mut dependent);
            detached.push(dependent);
        }
        changes.delete_task(&task);
        if let Some(sprint_id) = task.sprint_id() {
            if let Some(mut sprint) = self.repository.find_sprint(sprint_id).await? {
                changes.touch_sprint(&mut sprint);
            }
        }
        self.repository.commit(changes).await?;

        info!(
            task_id = %task_id,
            detached = detached.len(),
            "task deleted"
        );
        Ok(detached)
    }

    /// Returns a task's transition history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::NotFound`] for an unknown task.
    pub async fn task_history(
        &self,
        task_id: TaskId,
    ) -> TrackerServiceResult<Vec<TaskTransitionRecord>> {
        require_task(&*self.repository, task_id).await?;
        Ok(self.repository.find_transitions(task_id).await?)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Repository`] when the lookup fails.
    pub async fn find_task(&self, task_id: TaskId) -> TrackerServiceResult<Option<Task>> {
        Ok(self.repository.find_task(task_id).await?)
    }

    async fn advance(
        &self,
        actor: UserId,
        task_id: TaskId,
        target: TaskStatus,
        mover: Mover,
    ) -> TrackerServiceResult<Task> {
        let mut task = require_task(&*self.repository, task_id).await?;
        match mover {
            Mover::AssignedWorker => {
                if task.worker_id() != Some(actor) {
                    return Err(TrackerServiceError::Forbidden(Denial::NotAssignedWorker {
                        user_id: actor,
                        task_id,
                    }));
                }
            }
            Mover::Tester => {
                let user = require_user(&*self.repository, actor).await?;
                if user.role() != Role::Tester {
                    return Err(TrackerServiceError::Forbidden(Denial::NotTester {
                        user_id: actor,
                    }));
                }
            }
        }
        if active_sprint_of(&*self.repository, &task).await?.is_none() {
            return Err(TrackerDomainError::TaskSprintNotActive { task_id }.into());
        }

        let from = task.status();
        let record = task.transition_to(target, &*self.clock)?;
        let mut changes = ChangeSet::new();
        changes.update_task(&mut task);
        changes.record(record);
        let released = self.release_dependents(&task, &mut changes).await?;
        self.repository.commit(changes).await?;

        info!(
            task_id = %task_id,
            from = %from,
            to = %target,
            released,
            "task status changed"
        );
        Ok(task)
    }

    /// Queues `Wait -> Available` for dependents whose relation fires on the
    /// prerequisite's new status. Only direct dependents are considered.
    async fn release_dependents(
        &self,
        prerequisite: &Task,
        changes: &mut ChangeSet,
    ) -> TrackerServiceResult<usize> {
        let mut released = 0;
        for mut dependent in self.repository.find_dependents(prerequisite.id()).await? {
            if dependent.dependency_type().trigger_status() != Some(prerequisite.status()) {
                continue;
            }
            if let Some(record) = dependent.unblock(&*self.clock) {
                debug!(
                    task_id = %dependent.id(),
                    prerequisite = %prerequisite.id(),
                    "dependent released"
                );
                changes.update_task(&mut dependent);
                changes.record(record);
                released += 1;
            }
        }
        Ok(released)
    }
}

/// Brings a not-yet-started task in an active sprint in line with its
/// prerequisite. Returns a record only when the status changes.
fn settle_waiting(
    task: &mut Task,
    graph: &DependencyGraph,
    clock: &impl Clock,
) -> TrackerServiceResult<Option<TaskTransitionRecord>> {
    if !matches!(
        task.status(),
        TaskStatus::NotAvailable | TaskStatus::Available | TaskStatus::Wait
    ) {
        return Ok(None);
    }
    let target = if graph.is_satisfied(task) {
        TaskStatus::Available
    } else {
        TaskStatus::Wait
    };
    if task.status() == target {
        return Ok(None);
    }
    Ok(Some(task.transition_to(target, clock)?))
}
