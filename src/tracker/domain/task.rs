//! Task aggregate root and transition history.

use super::{
    DependencyType, EpicId, ProjectId, Revision, SprintId, TaskId, TaskStatus,
    TrackerDomainError, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest accepted task or sprint name, in characters.
pub(super) const MIN_NAME_CHARS: usize = 3;
/// Longest accepted task or sprint name, in characters.
pub(super) const MAX_NAME_CHARS: usize = 100;

/// Trims `raw` and returns it when its length is within the name bounds.
pub(super) fn normalized_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let length = trimmed.chars().count();
    (MIN_NAME_CHARS..=MAX_NAME_CHARS)
        .contains(&length)
        .then(|| trimmed.to_owned())
}

/// Validated task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    /// Creates a validated task name.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::InvalidTaskName`] when the trimmed name
    /// is shorter than 3 or longer than 100 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, TrackerDomainError> {
        let raw = value.into();
        normalized_name(&raw)
            .map(Self)
            .ok_or(TrackerDomainError::InvalidTaskName(raw))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only history entry written on every task status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransitionRecord {
    task_id: TaskId,
    status: TaskStatus,
    recorded_at: DateTime<Utc>,
}

impl TaskTransitionRecord {
    /// Creates a history entry.
    #[must_use]
    pub const fn new(task_id: TaskId, status: TaskStatus, recorded_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            status,
            recorded_at,
        }
    }

    /// Returns the task the entry belongs to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the status the task moved into.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns when the move happened.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project_id: ProjectId,
    epic_id: Option<EpicId>,
    name: TaskName,
    priority: u8,
    status: TaskStatus,
    dependent_on: Option<TaskId>,
    dependency_type: DependencyType,
    worker_id: Option<UserId>,
    sprint_id: Option<SprintId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: Revision,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Optional epic grouping.
    pub epic_id: Option<EpicId>,
    /// Persisted name.
    pub name: TaskName,
    /// Persisted priority.
    pub priority: u8,
    /// Persisted status.
    pub status: TaskStatus,
    /// Prerequisite task, if any.
    pub dependent_on: Option<TaskId>,
    /// Kind of the prerequisite relation.
    pub dependency_type: DependencyType,
    /// Assigned worker, if any.
    pub worker_id: Option<UserId>,
    /// Sprint the task belongs to, if any.
    pub sprint_id: Option<SprintId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Stored revision.
    pub revision: Revision,
}

impl Task {
    /// Creates a task in [`TaskStatus::NotAvailable`] with no dependency,
    /// worker, or sprint.
    #[must_use]
    pub fn new(project_id: ProjectId, name: TaskName, priority: u8, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            project_id,
            epic_id: None,
            name,
            priority,
            status: TaskStatus::NotAvailable,
            dependent_on: None,
            dependency_type: DependencyType::None,
            worker_id: None,
            sprint_id: None,
            created_at: timestamp,
            updated_at: timestamp,
            revision: Revision::INITIAL,
        }
    }

    /// Places the task inside an epic.
    #[must_use]
    pub const fn with_epic(mut self, epic_id: EpicId) -> Self {
        self.epic_id = Some(epic_id);
        self
    }

    /// Reconstructs a task from persisted storage.
    ///
    /// A stored prerequisite with [`DependencyType::None`] is dropped so the
    /// aggregate never carries a constraint-free dependency edge.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        let (dependent_on, dependency_type) =
            normalize_dependency(data.dependent_on, data.dependency_type);
        Self {
            id: data.id,
            project_id: data.project_id,
            epic_id: data.epic_id,
            name: data.name,
            priority: data.priority,
            status: data.status,
            dependent_on,
            dependency_type,
            worker_id: data.worker_id,
            sprint_id: data.sprint_id,
            created_at: data.created_at,
            updated_at: data.updated_at,
            revision: data.revision,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the epic, if any.
    #[must_use]
    pub const fn epic_id(&self) -> Option<EpicId> {
        self.epic_id
    }

    /// Returns the task name.
    #[must_use]
    pub const fn name(&self) -> &TaskName {
        &self.name
    }

    /// Returns the task priority.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the prerequisite task, if any.
    #[must_use]
    pub const fn dependent_on(&self) -> Option<TaskId> {
        self.dependent_on
    }

    /// Returns the kind of the prerequisite relation.
    #[must_use]
    pub const fn dependency_type(&self) -> DependencyType {
        self.dependency_type
    }

    /// Returns the prerequisite together with its kind when the task has a
    /// constraining dependency.
    #[must_use]
    pub const fn dependency(&self) -> Option<(TaskId, DependencyType)> {
        match self.dependent_on {
            Some(prerequisite) => Some((prerequisite, self.dependency_type)),
            None => None,
        }
    }

    /// Returns the assigned worker, if any.
    #[must_use]
    pub const fn worker_id(&self) -> Option<UserId> {
        self.worker_id
    }

    /// Returns the sprint the task belongs to, if any.
    #[must_use]
    pub const fn sprint_id(&self) -> Option<SprintId> {
        self.sprint_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the stored revision this copy was read at.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Moves the task to `target` when the status machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::InvalidTaskTransition`] and leaves the
    /// task untouched when the move is not in the transition table.
    pub fn transition_to(
        &mut self,
        target: TaskStatus,
        clock: &impl Clock,
    ) -> Result<TaskTransitionRecord, TrackerDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(TrackerDomainError::InvalidTaskTransition {
                task_id: self.id,
                from: self.status,
                to: target,
            });
        }
        Ok(self.set_status(target, clock))
    }

    /// Re-evaluates the task as its sprint launches.
    ///
    /// Completed tasks and tasks under review keep their status and produce
    /// no record. Every other task is set to `Available` or `Wait` depending
    /// on `dependency_satisfied`, and the setting is recorded even when the
    /// status does not change.
    pub fn reevaluate_for_launch(
        &mut self,
        dependency_satisfied: bool,
        clock: &impl Clock,
    ) -> Option<TaskTransitionRecord> {
        if self.status.is_terminal() || self.status.is_under_review() {
            return None;
        }
        let target = if dependency_satisfied {
            TaskStatus::Available
        } else {
            TaskStatus::Wait
        };
        Some(self.set_status(target, clock))
    }

    /// Moves a waiting task to `Available`.
    ///
    /// Returns `None` and changes nothing unless the task is in `Wait`.
    pub fn unblock(&mut self, clock: &impl Clock) -> Option<TaskTransitionRecord> {
        (self.status == TaskStatus::Wait).then(|| self.set_status(TaskStatus::Available, clock))
    }

    /// Replaces the prerequisite relation.
    ///
    /// A missing prerequisite or [`DependencyType::None`] clears the
    /// relation entirely. Cycle and project checks are the caller's job.
    pub fn set_dependency(
        &mut self,
        prerequisite: Option<TaskId>,
        dependency_type: DependencyType,
        clock: &impl Clock,
    ) {
        let (dependent_on, kind) = normalize_dependency(prerequisite, dependency_type);
        self.dependent_on = dependent_on;
        self.dependency_type = kind;
        self.touch(clock);
    }

    /// Drops the prerequisite relation.
    pub fn clear_dependency(&mut self, clock: &impl Clock) {
        self.set_dependency(None, DependencyType::None, clock);
    }

    /// Assigns or unassigns the worker.
    pub fn assign_worker(&mut self, worker_id: Option<UserId>, clock: &impl Clock) {
        self.worker_id = worker_id;
        self.touch(clock);
    }

    /// Places the task in a sprint.
    pub fn join_sprint(&mut self, sprint_id: SprintId, clock: &impl Clock) {
        self.sprint_id = Some(sprint_id);
        self.touch(clock);
    }

    /// Removes the task from its sprint without touching its status.
    pub fn leave_sprint(&mut self, clock: &impl Clock) {
        self.sprint_id = None;
        self.touch(clock);
    }

    /// Advances the revision after a change has been queued for commit.
    pub(crate) const fn advance_revision(&mut self) {
        self.revision = self.revision.next();
    }

    fn set_status(&mut self, target: TaskStatus, clock: &impl Clock) -> TaskTransitionRecord {
        self.status = target;
        self.touch(clock);
        TaskTransitionRecord::new(self.id, target, self.updated_at)
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

const fn normalize_dependency(
    prerequisite: Option<TaskId>,
    dependency_type: DependencyType,
) -> (Option<TaskId>, DependencyType) {
    match (prerequisite, dependency_type) {
        (None, _) | (_, DependencyType::None) => (None, DependencyType::None),
        (Some(id), kind) => (Some(id), kind),
    }
}
