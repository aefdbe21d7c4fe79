//! Sprint scheduling: drafting, launch gating, membership, and expiry.

use super::{
    error::{DependencyViolation, Precondition, TrackerServiceError, TrackerServiceResult},
    support::{
        ensure_project_permission, ensure_task_in_project, require_project, require_sprint,
        require_task,
    },
};
use crate::config::SchedulerConfig;
use crate::tracker::{
    domain::{
        DependencyGraph, ProjectId, Sprint, SprintDuration, SprintId, SprintName, SprintState,
        Task, TaskId, TaskStatus, UserId,
    },
    ports::{ChangeSet, PermissionGate, TrackerRepository},
};
use mockable::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Request payload for drafting a sprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSprintRequest {
    project_id: ProjectId,
    name: String,
    duration: SprintDuration,
}

impl CreateSprintRequest {
    /// Creates a request for a one-week sprint.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project_id,
            name: name.into(),
            duration: SprintDuration::OneWeek,
        }
    }

    /// Sets the planned length.
    #[must_use]
    pub const fn with_duration(mut self, duration: SprintDuration) -> Self {
        self.duration = duration;
        self
    }
}

/// Outcome of closing out an expired sprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredSprint {
    sprint: Sprint,
    released_tasks: Vec<TaskId>,
}

impl ExpiredSprint {
    /// Returns the completed sprint.
    #[must_use]
    pub const fn sprint(&self) -> &Sprint {
        &self.sprint
    }

    /// Returns the unfinished tasks that were taken out of the sprint.
    #[must_use]
    pub fn released_tasks(&self) -> &[TaskId] {
        &self.released_tasks
    }
}

/// Sprint scheduling service.
#[derive(Clone)]
pub struct SprintSchedulerService<R, P, C>
where
    R: TrackerRepository,
    P: PermissionGate,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    permissions: Arc<P>,
    clock: Arc<C>,
    min_launch_tasks: usize,
}

impl<R, P, C> SprintSchedulerService<R, P, C>
where
    R: TrackerRepository,
    P: PermissionGate,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler with default launch rules.
    #[must_use]
    pub const fn new(repository: Arc<R>, permissions: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            repository,
            permissions,
            clock,
            min_launch_tasks: SchedulerConfig::DEFAULT_MIN_LAUNCH_TASKS,
        }
    }

    /// Applies launch rules from `config`.
    #[must_use]
    pub const fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.min_launch_tasks = config.min_launch_tasks;
        self
    }

    /// Returns the smallest task count a sprint may launch with.
    #[must_use]
    pub const fn min_launch_tasks(&self) -> usize {
        self.min_launch_tasks
    }

    /// Drafts a new sprint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::SprintConflict`] when the project
    /// already has a draft or active sprint,
    /// [`TrackerServiceError::Forbidden`] without project permission, or
    /// [`TrackerServiceError::Validation`] for a bad name.
    pub async fn create_sprint(
        &self,
        actor: UserId,
        request: CreateSprintRequest,
    ) -> TrackerServiceResult<Sprint> {
        let project = require_project(&*self.repository, request.project_id).await?;
        ensure_project_permission(&*self.permissions, actor, project.id()).await?;
        let name = SprintName::new(request.name)?;

        let existing = self
            .repository
            .find_sprints_by_project(project.id())
            .await?;
        if existing.iter().any(|sprint| !sprint.is_completed()) {
            return Err(TrackerServiceError::SprintConflict(project.id()));
        }

        let sprint = Sprint::new(project.id(), name, request.duration, &*self.clock);
        let mut changes = ChangeSet::new();
        changes.insert_sprint(&sprint);
        self.repository.commit(changes).await?;

        info!(
            sprint_id = %sprint.id(),
            project_id = %project.id(),
            weeks = sprint.duration().weeks(),
            "sprint drafted"
        );
        Ok(sprint)
    }

    /// Launches a draft sprint.
    ///
    /// Checks run in order and the first failure wins: the sprint must be a
    /// draft, hold enough tasks, have every task assigned, and have every
    /// prerequisite either inside the sprint or already complete. Nothing
    /// is written when a check fails.
    ///
    /// On success the sprint becomes active and every task not complete or
    /// under review is set to `Available` or `Wait`, each with a record.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::InvalidTransition`],
    /// [`TrackerServiceError::PreconditionFailed`], or
    /// [`TrackerServiceError::DependencyValidationFailed`] per the checks
    /// above.
    pub async fn launch_sprint(
        &self,
        actor: UserId,
        sprint_id: SprintId,
    ) -> TrackerServiceResult<Sprint> {
        let sprint = require_sprint(&*self.repository, sprint_id).await?;
        ensure_project_permission(&*self.permissions, actor, sprint.project_id()).await?;

        let mut launched = sprint.clone();
        launched.launch(&*self.clock)?;

        let mut sprint_tasks = self.repository.find_tasks_by_sprint(sprint_id).await?;
        if sprint_tasks.len() < self.min_launch_tasks {
            return Err(Precondition::InsufficientTasks {
                sprint_id,
                found: sprint_tasks.len(),
                required: self.min_launch_tasks,
            }
            .into());
        }

        let unassigned: Vec<TaskId> = sprint_tasks
            .iter()
            .filter(|task| task.worker_id().is_none())
            .map(Task::id)
            .collect();
        if !unassigned.is_empty() {
            return Err(Precondition::UnassignedWorkers {
                sprint_id,
                tasks: unassigned,
            }
            .into());
        }

        let project_tasks = self
            .repository
            .find_tasks_by_project(sprint.project_id())
            .await?;
        let violations = dependency_violations(&sprint_tasks, &project_tasks);
        if !violations.is_empty() {
            return Err(TrackerServiceError::DependencyValidationFailed {
                sprint_id,
                violations,
            });
        }

        let mut graph = DependencyGraph::from_tasks(&project_tasks);
        for task in &sprint_tasks {
            if !task.status().is_terminal() && !task.status().is_under_review() {
                // Tasks about to be reset cannot satisfy anyone until they move.
                graph.set_status(task.id(), TaskStatus::Available);
            }
        }

        let mut changes = ChangeSet::new();
        for task in &mut sprint_tasks {
            let satisfied = graph.is_satisfied(task);
            if let Some(record) = task.reevaluate_for_launch(satisfied, &*self.clock) {
                changes.update_task(task);
                changes.record(record);
            }
        }
        changes.update_sprint(&mut launched);
        self.repository.commit(changes).await?;

        info!(
            sprint_id = %sprint_id,
            tasks = sprint_tasks.len(),
            end_date = ?launched.end_date(),
            "sprint launched"
        );
        Ok(launched)
    }

    /// Deletes a draft or completed sprint, detaching its tasks.
    ///
    /// Every task still referencing the sprint is detached, including the
    /// complete tasks that expiry left attached. Statuses are kept and no
    /// records are written.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::PreconditionFailed`] for an active
    /// sprint.
    pub async fn delete_sprint(&self, actor: UserId, sprint_id: SprintId) -> TrackerServiceResult<()> {
        let sprint = require_sprint(&*self.repository, sprint_id).await?;
        ensure_project_permission(&*self.permissions, actor, sprint.project_id()).await?;
        if sprint.is_active() {
            return Err(Precondition::SprintActive(sprint_id).into());
        }

        let mut changes = ChangeSet::new();
        for mut task in self.repository.find_tasks_by_sprint(sprint_id).await? {
            task.leave_sprint(&*self.clock);
            changes.update_task(&mut task);
        }
        changes.delete_sprint(&sprint);
        self.repository.commit(changes).await?;

        info!(sprint_id = %sprint_id, "sprint deleted");
        Ok(())
    }

    /// Adds a task to a draft or active sprint.
    ///
    /// Adding a task that is already in the sprint changes nothing. A task
    /// joining an active sprint is evaluated at once unless it is under
    /// review.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::PreconditionFailed`] when the sprint is
    /// completed, the task belongs to another project or sprint, or the task
    /// is already complete.
    pub async fn add_task(
        &self,
        actor: UserId,
        sprint_id: SprintId,
        task_id: TaskId,
    ) -> TrackerServiceResult<Task> {
        let mut sprint = require_sprint(&*self.repository, sprint_id).await?;
        ensure_project_permission(&*self.permissions, actor, sprint.project_id()).await?;
        if sprint.is_completed() {
            return Err(Precondition::SprintCompleted(sprint_id).into());
        }

        let mut task = require_task(&*self.repository, task_id).await?;
        ensure_task_in_project(&task, sprint.project_id())?;
        if task.status() == TaskStatus::Complete {
            return Err(Precondition::TaskAlreadyComplete(task_id).into());
        }
        match task.sprint_id() {
            Some(current) if current == sprint_id => return Ok(task),
            Some(current) => {
                return Err(Precondition::TaskInOtherSprint {
                    task_id,
                    sprint_id: current,
                }
                .into());
            }
            None => {}
        }

        task.join_sprint(sprint_id, &*self.clock);
        let mut changes = ChangeSet::new();
        if sprint.is_active() {
            let mut graph = DependencyGraph::default();
            if let Some(prerequisite_id) = task.dependent_on() {
                if let Some(prerequisite) = self.repository.find_task(prerequisite_id).await? {
                    graph.insert(&prerequisite);
                }
            }
            if let Some(record) = task.reevaluate_for_launch(graph.is_satisfied(&task), &*self.clock)
            {
                changes.record(record);
            }
        }
        changes.update_task(&mut task);
        changes.touch_sprint(&mut sprint);
        self.repository.commit(changes).await?;

        debug!(sprint_id = %sprint_id, task_id = %task_id, status = %task.status(), "task added to sprint");
        Ok(task)
    }

    /// Takes a task out of a draft sprint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::PreconditionFailed`] unless the sprint
    /// is a draft holding the task.
    pub async fn remove_task(
        &self,
        actor: UserId,
        sprint_id: SprintId,
        task_id: TaskId,
    ) -> TrackerServiceResult<Task> {
        let mut sprint = require_sprint(&*self.repository, sprint_id).await?;
        ensure_project_permission(&*self.permissions, actor, sprint.project_id()).await?;
        if sprint.state() != SprintState::Draft {
            return Err(Precondition::SprintNotDraft {
                sprint_id,
                state: sprint.state(),
            }
            .into());
        }

        let mut task = require_task(&*self.repository, task_id).await?;
        if task.sprint_id() != Some(sprint_id) {
            return Err(Precondition::TaskNotInSprint { task_id, sprint_id }.into());
        }
        task.leave_sprint(&*self.clock);
        let mut changes = ChangeSet::new();
        changes.update_task(&mut task);
        changes.touch_sprint(&mut sprint);
        self.repository.commit(changes).await?;

        debug!(sprint_id = %sprint_id, task_id = %task_id, "task removed from sprint");
        Ok(task)
    }

    /// Returns active sprints whose end date has passed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Repository`] when the lookup fails.
    pub async fn due_sprints(&self) -> TrackerServiceResult<Vec<Sprint>> {
        Ok(self
            .repository
            .find_expired_sprints(self.clock.utc())
            .await?)
    }

    /// Completes an active sprint whose end date has passed.
    ///
    /// Unfinished tasks leave the sprint and keep their status; completed
    /// tasks stay attached. No transition records are written. Returns
    /// `None` when the sprint is not active or not yet due.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::NotFound`] for an unknown sprint or a
    /// repository error when the commit fails.
    pub async fn expire_sprint(
        &self,
        sprint_id: SprintId,
    ) -> TrackerServiceResult<Option<ExpiredSprint>> {
        let mut sprint = require_sprint(&*self.repository, sprint_id).await?;
        if !sprint.is_expired_at(self.clock.utc()) {
            return Ok(None);
        }
        sprint.complete()?;

        let mut changes = ChangeSet::new();
        let mut released_tasks = Vec::new();
        for mut task in self.repository.find_tasks_by_sprint(sprint_id).await? {
            if task.status() == TaskStatus::Complete {
                continue;
            }
            task.leave_sprint(&*self.clock);
            changes.update_task(&mut task);
            released_tasks.push(task.id());
        }
        changes.update_sprint(&mut sprint);
        self.repository.commit(changes).await?;

        info!(
            sprint_id = %sprint_id,
            released = released_tasks.len(),
            "sprint expired"
        );
        Ok(Some(ExpiredSprint {
            sprint,
            released_tasks,
        }))
    }

    /// Finds a sprint by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::Repository`] when the lookup fails.
    pub async fn find_sprint(&self, sprint_id: SprintId) -> TrackerServiceResult<Option<Sprint>> {
        Ok(self.repository.find_sprint(sprint_id).await?)
    }

    /// Returns the tasks currently in a sprint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerServiceError::NotFound`] for an unknown sprint.
    pub async fn tasks_in_sprint(&self, sprint_id: SprintId) -> TrackerServiceResult<Vec<Task>> {
        require_sprint(&*self.repository, sprint_id).await?;
        Ok(self.repository.find_tasks_by_sprint(sprint_id).await?)
    }
}

/// Lists sprint tasks whose prerequisite is neither in the sprint nor
/// complete. A prerequisite that no longer exists is a violation too.
fn dependency_violations(sprint_tasks: &[Task], project_tasks: &[Task]) -> Vec<DependencyViolation> {
    let in_sprint: HashSet<TaskId> = sprint_tasks.iter().map(Task::id).collect();
    let statuses: HashMap<TaskId, TaskStatus> = project_tasks
        .iter()
        .map(|task| (task.id(), task.status()))
        .collect();

    sprint_tasks
        .iter()
        .filter_map(|task| {
            let (prerequisite, _) = task.dependency()?;
            if in_sprint.contains(&prerequisite) {
                return None;
            }
            let prerequisite_status = statuses.get(&prerequisite).copied();
            (prerequisite_status != Some(TaskStatus::Complete)).then_some(DependencyViolation {
                task_id: task.id(),
                prerequisite,
                prerequisite_status,
            })
        })
        .collect()
}
