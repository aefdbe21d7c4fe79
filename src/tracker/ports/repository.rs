//! Repository port for tracker persistence.
//!
//! Reads return detached copies of aggregates. Writes are batched into a
//! [`ChangeSet`] and applied with [`TrackerRepository::commit`], which must
//! apply every change or none of them.

use crate::tracker::domain::{
    EntityRef, Project, ProjectId, Revision, Sprint, SprintId, Task, TaskId,
    TaskTransitionRecord, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for tracker repository operations.
pub type TrackerRepositoryResult<T> = Result<T, TrackerRepositoryError>;

/// A queued update together with the revision it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revised<T> {
    expected: Revision,
    value: T,
}

impl<T> Revised<T> {
    /// Returns the revision the store must still hold for the write to apply.
    #[must_use]
    pub const fn expected(&self) -> Revision {
        self.expected
    }

    /// Returns the new value to store.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }
}

/// A queued deletion together with the revision it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion<I> {
    id: I,
    expected: Revision,
}

impl<I: Copy> Deletion<I> {
    /// Returns the identifier to delete.
    #[must_use]
    pub const fn id(&self) -> I {
        self.id
    }

    /// Returns the revision the store must still hold for the delete to apply.
    #[must_use]
    pub const fn expected(&self) -> Revision {
        self.expected
    }
}

/// Unit of work applied atomically by [`TrackerRepository::commit`].
///
/// Updating an aggregate through the change set advances its in-memory
/// revision, so the caller's copy matches what the store holds after a
/// successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    inserted_tasks: Vec<Task>,
    updated_tasks: Vec<Revised<Task>>,
    deleted_tasks: Vec<Deletion<TaskId>>,
    inserted_sprints: Vec<Sprint>,
    updated_sprints: Vec<Revised<Sprint>>,
    deleted_sprints: Vec<Deletion<SprintId>>,
    updated_projects: Vec<Revised<Project>>,
    transitions: Vec<TaskTransitionRecord>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new task.
    pub fn insert_task(&mut self, task: &Task) {
        self.inserted_tasks.push(task.clone());
    }

    /// Queues a revision-checked task update.
    pub fn update_task(&mut self, task: &mut Task) {
        let expected = task.revision();
        task.advance_revision();
        upsert(&mut self.updated_tasks, expected, task.clone(), Task::id);
    }

    /// Queues a revision-checked task deletion.
    ///
    /// Stores drop the task's transition records with it.
    pub fn delete_task(&mut self, task: &Task) {
        self.deleted_tasks.push(Deletion {
            id: task.id(),
            expected: task.revision(),
        });
    }

    /// Queues a new sprint.
    pub fn insert_sprint(&mut self, sprint: &Sprint) {
        self.inserted_sprints.push(sprint.clone());
    }

    /// Queues a revision-checked sprint update.
    pub fn update_sprint(&mut self, sprint: &mut Sprint) {
        let expected = sprint.revision();
        sprint.advance_revision();
        upsert(&mut self.updated_sprints, expected, sprint.clone(), Sprint::id);
    }

    /// Queues a revision bump for a sprint whose task membership changes.
    ///
    /// Launch, expiry and deletion are revision-checked against the sprint,
    /// so a membership write that commits first makes them fail with
    /// [`TrackerRepositoryError::ConcurrentModification`], and the other way
    /// round.
    pub fn touch_sprint(&mut self, sprint: &mut Sprint) {
        self.update_sprint(sprint);
    }

    /// Queues a revision-checked sprint deletion.
    pub fn delete_sprint(&mut self, sprint: &Sprint) {
        self.deleted_sprints.push(Deletion {
            id: sprint.id(),
            expected: sprint.revision(),
        });
    }

    /// Queues a revision-checked project update.
    pub fn update_project(&mut self, project: &mut Project) {
        let expected = project.revision();
        project.advance_revision();
        upsert(&mut self.updated_projects, expected, project.clone(), Project::id);
    }

    /// Queues a transition record.
    pub fn record(&mut self, record: TaskTransitionRecord) {
        self.transitions.push(record);
    }

    /// Returns whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted_tasks.is_empty()
            && self.updated_tasks.is_empty()
            && self.deleted_tasks.is_empty()
            && self.inserted_sprints.is_empty()
            && self.updated_sprints.is_empty()
            && self.deleted_sprints.is_empty()
            && self.updated_projects.is_empty()
            && self.transitions.is_empty()
    }

    /// Returns queued task inserts.
    #[must_use]
    pub fn inserted_tasks(&self) -> &[Task] {
        &self.inserted_tasks
    }

    /// Returns queued task updates.
    #[must_use]
    pub fn updated_tasks(&self) -> &[Revised<Task>] {
        &self.updated_tasks
    }

    /// Returns queued task deletions.
    #[must_use]
    pub fn deleted_tasks(&self) -> &[Deletion<TaskId>] {
        &self.deleted_tasks
    }

    /// Returns queued sprint inserts.
    #[must_use]
    pub fn inserted_sprints(&self) -> &[Sprint] {
        &self.inserted_sprints
    }

    /// Returns queued sprint updates.
    #[must_use]
    pub fn updated_sprints(&self) -> &[Revised<Sprint>] {
        &self.updated_sprints
    }

    /// Returns queued sprint deletions.
    #[must_use]
    pub fn deleted_sprints(&self) -> &[Deletion<SprintId>] {
        &self.deleted_sprints
    }

    /// Returns queued project updates.
    #[must_use]
    pub fn updated_projects(&self) -> &[Revised<Project>] {
        &self.updated_projects
    }

    /// Returns queued transition records, in the order they were recorded.
    #[must_use]
    pub fn transitions(&self) -> &[TaskTransitionRecord] {
        &self.transitions
    }
}

/// Replaces a queued update for the same entity, keeping the first expected
/// revision, or appends a new one.
fn upsert<T, K: PartialEq>(
    entries: &mut Vec<Revised<T>>,
    expected: Revision,
    value: T,
    key: impl Fn(&T) -> K,
) {
    let value_key = key(&value);
    if let Some(entry) = entries.iter_mut().find(|entry| key(&entry.value) == value_key) {
        entry.value = value;
    } else {
        entries.push(Revised { expected, value });
    }
}

/// Tracker persistence contract.
#[async_trait]
pub trait TrackerRepository: Send + Sync {
    /// Stores a user account.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerRepositoryError::Duplicate`] when the identifier is
    /// taken.
    async fn store_user(&self, user: &User) -> TrackerRepositoryResult<()>;

    /// Stores a project with its membership.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerRepositoryError::Duplicate`] when the identifier is
    /// taken.
    async fn store_project(&self, project: &Project) -> TrackerRepositoryResult<()>;

    /// Finds a user by identifier.
    async fn find_user(&self, id: UserId) -> TrackerRepositoryResult<Option<User>>;

    /// Finds a project by identifier.
    async fn find_project(&self, id: ProjectId) -> TrackerRepositoryResult<Option<Project>>;

    /// Finds a task by identifier.
    async fn find_task(&self, id: TaskId) -> TrackerRepositoryResult<Option<Task>>;

    /// Returns every task in a project.
    async fn find_tasks_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Task>>;

    /// Returns every task currently assigned to a sprint.
    async fn find_tasks_by_sprint(&self, sprint_id: SprintId)
    -> TrackerRepositoryResult<Vec<Task>>;

    /// Returns every task naming `prerequisite` as its `dependent_on`.
    async fn find_dependents(&self, prerequisite: TaskId) -> TrackerRepositoryResult<Vec<Task>>;

    /// Finds a sprint by identifier.
    async fn find_sprint(&self, id: SprintId) -> TrackerRepositoryResult<Option<Sprint>>;

    /// Returns every sprint of a project.
    async fn find_sprints_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Sprint>>;

    /// Returns active sprints whose end date is at or before `now`.
    async fn find_expired_sprints(
        &self,
        now: DateTime<Utc>,
    ) -> TrackerRepositoryResult<Vec<Sprint>>;

    /// Returns a task's transition history, oldest first.
    async fn find_transitions(
        &self,
        task_id: TaskId,
    ) -> TrackerRepositoryResult<Vec<TaskTransitionRecord>>;

    /// Applies every queued change atomically.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerRepositoryError::ConcurrentModification`] when a
    /// stored revision no longer matches, [`TrackerRepositoryError::NotFound`]
    /// when an updated or deleted entity is gone,
    /// [`TrackerRepositoryError::OpenSprintExists`] when the result would
    /// leave a project with two uncompleted sprints, or
    /// [`TrackerRepositoryError::Duplicate`] for an identifier clash. No
    /// change is applied in any of these cases.
    async fn commit(&self, changes: ChangeSet) -> TrackerRepositoryResult<()>;
}

/// Errors returned by tracker repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TrackerRepositoryError {
    /// An entity with the same identifier already exists.
    #[error("duplicate {0}")]
    Duplicate(EntityRef),

    /// The entity was not found.
    #[error("{0} not found")]
    NotFound(EntityRef),

    /// The stored revision moved on since the change was computed.
    #[error("{entity} was modified concurrently (expected revision {expected})")]
    ConcurrentModification {
        /// Entity whose revision check failed.
        entity: EntityRef,
        /// Revision the change was computed from.
        expected: Revision,
    },

    /// The project already has a sprint that is not completed.
    #[error("project {0} already has an uncompleted sprint")]
    OpenSprintExists(ProjectId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TrackerRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for TrackerRepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
