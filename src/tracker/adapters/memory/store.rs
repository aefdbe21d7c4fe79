//! In-memory tracker repository for testing.

use crate::tracker::{
    domain::{
        EntityRef, Project, ProjectId, Revision, Sprint, SprintId, Task, TaskId,
        TaskTransitionRecord, User, UserId,
    },
    ports::{ChangeSet, TrackerRepository, TrackerRepositoryError, TrackerRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory tracker repository.
///
/// Commits are applied to a scratch copy of the whole state and swapped in
/// only when every check passes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackerStore {
    state: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
    sprints: HashMap<SprintId, Sprint>,
    transitions: Vec<TaskTransitionRecord>,
}

impl InMemoryTrackerStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> TrackerRepositoryResult<T> {
        let state = self.state.read().map_err(|err| {
            TrackerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(f(&state))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> TrackerRepositoryResult<T>,
    ) -> TrackerRepositoryResult<T> {
        let mut state = self.state.write().map_err(|err| {
            TrackerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        f(&mut state)
    }
}

/// Fails unless the stored revision equals `expected`.
fn check_revision(
    entity: EntityRef,
    stored: Option<Revision>,
    expected: Revision,
) -> TrackerRepositoryResult<()> {
    match stored {
        None => Err(TrackerRepositoryError::NotFound(entity)),
        Some(current) if current == expected => Ok(()),
        Some(_) => Err(TrackerRepositoryError::ConcurrentModification { entity, expected }),
    }
}

fn sorted_tasks<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<Task> {
    let mut found: Vec<Task> = tasks.cloned().collect();
    found.sort_by_key(|task| (task.created_at(), task.id()));
    found
}

fn apply_task_changes(state: &mut StoreState, changes: &ChangeSet) -> TrackerRepositoryResult<()> {
    for deletion in changes.deleted_tasks() {
        let entity = EntityRef::Task(deletion.id());
        let stored = state.tasks.get(&deletion.id()).map(Task::revision);
        check_revision(entity, stored, deletion.expected())?;
        state.tasks.remove(&deletion.id());
        state
            .transitions
            .retain(|record| record.task_id() != deletion.id());
    }

    for update in changes.updated_tasks() {
        let task = update.value();
        let stored = state.tasks.get(&task.id()).map(Task::revision);
        check_revision(EntityRef::Task(task.id()), stored, update.expected())?;
        state.tasks.insert(task.id(), task.clone());
    }

    for task in changes.inserted_tasks() {
        if state.tasks.contains_key(&task.id()) {
            return Err(TrackerRepositoryError::Duplicate(EntityRef::Task(task.id())));
        }
        state.tasks.insert(task.id(), task.clone());
    }

    for record in changes.transitions() {
        if !state.tasks.contains_key(&record.task_id()) {
            return Err(TrackerRepositoryError::NotFound(EntityRef::Task(
                record.task_id(),
            )));
        }
        state.transitions.push(record.clone());
    }
    Ok(())
}

fn apply_sprint_changes(
    state: &mut StoreState,
    changes: &ChangeSet,
) -> TrackerRepositoryResult<()> {
    let mut touched_projects = HashSet::new();

    for deletion in changes.deleted_sprints() {
        let entity = EntityRef::Sprint(deletion.id());
        let stored = state.sprints.get(&deletion.id()).map(Sprint::revision);
        check_revision(entity, stored, deletion.expected())?;
        state.sprints.remove(&deletion.id());
    }

    for update in changes.updated_sprints() {
        let sprint = update.value();
        let stored = state.sprints.get(&sprint.id()).map(Sprint::revision);
        check_revision(EntityRef::Sprint(sprint.id()), stored, update.expected())?;
        touched_projects.insert(sprint.project_id());
        state.sprints.insert(sprint.id(), sprint.clone());
    }

    for sprint in changes.inserted_sprints() {
        if state.sprints.contains_key(&sprint.id()) {
            return Err(TrackerRepositoryError::Duplicate(EntityRef::Sprint(
                sprint.id(),
            )));
        }
        touched_projects.insert(sprint.project_id());
        state.sprints.insert(sprint.id(), sprint.clone());
    }

    for project_id in touched_projects {
        let open_sprints = state
            .sprints
            .values()
            .filter(|sprint| sprint.project_id() == project_id && !sprint.is_completed())
            .count();
        if open_sprints > 1 {
            return Err(TrackerRepositoryError::OpenSprintExists(project_id));
        }
    }
    Ok(())
}

fn apply_project_changes(
    state: &mut StoreState,
    changes: &ChangeSet,
) -> TrackerRepositoryResult<()> {
    for update in changes.updated_projects() {
        let project = update.value();
        let stored = state.projects.get(&project.id()).map(Project::revision);
        check_revision(EntityRef::Project(project.id()), stored, update.expected())?;
        state.projects.insert(project.id(), project.clone());
    }
    Ok(())
}

#[async_trait]
impl TrackerRepository for InMemoryTrackerStore {
    async fn store_user(&self, user: &User) -> TrackerRepositoryResult<()> {
        self.write(|state| {
            if state.users.contains_key(&user.id()) {
                return Err(TrackerRepositoryError::Duplicate(EntityRef::User(user.id())));
            }
            state.users.insert(user.id(), user.clone());
            Ok(())
        })
    }

    async fn store_project(&self, project: &Project) -> TrackerRepositoryResult<()> {
        self.write(|state| {
            if state.projects.contains_key(&project.id()) {
                return Err(TrackerRepositoryError::Duplicate(EntityRef::Project(
                    project.id(),
                )));
            }
            state.projects.insert(project.id(), project.clone());
            Ok(())
        })
    }

    async fn find_user(&self, id: UserId) -> TrackerRepositoryResult<Option<User>> {
        self.read(|state| state.users.get(&id).cloned())
    }

    async fn find_project(&self, id: ProjectId) -> TrackerRepositoryResult<Option<Project>> {
        self.read(|state| state.projects.get(&id).cloned())
    }

    async fn find_task(&self, id: TaskId) -> TrackerRepositoryResult<Option<Task>> {
        self.read(|state| state.tasks.get(&id).cloned())
    }

    async fn find_tasks_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Task>> {
        self.read(|state| {
            sorted_tasks(
                state
                    .tasks
                    .values()
                    .filter(|task| task.project_id() == project_id),
            )
        })
    }

    async fn find_tasks_by_sprint(
        &self,
        sprint_id: SprintId,
    ) -> TrackerRepositoryResult<Vec<Task>> {
        self.read(|state| {
            sorted_tasks(
                state
                    .tasks
                    .values()
                    .filter(|task| task.sprint_id() == Some(sprint_id)),
            )
        })
    }

    async fn find_dependents(&self, prerequisite: TaskId) -> TrackerRepositoryResult<Vec<Task>> {
        self.read(|state| {
            sorted_tasks(
                state
                    .tasks
                    .values()
                    .filter(|task| task.dependent_on() == Some(prerequisite)),
            )
        })
    }

    async fn find_sprint(&self, id: SprintId) -> TrackerRepositoryResult<Option<Sprint>> {
        self.read(|state| state.sprints.get(&id).cloned())
    }

    async fn find_sprints_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Sprint>> {
        self.read(|state| {
            let mut sprints: Vec<Sprint> = state
                .sprints
                .values()
                .filter(|sprint| sprint.project_id() == project_id)
                .cloned()
                .collect();
            sprints.sort_by_key(|sprint| (sprint.created_at(), sprint.id()));
            sprints
        })
    }

    async fn find_expired_sprints(
        &self,
        now: DateTime<Utc>,
    ) -> TrackerRepositoryResult<Vec<Sprint>> {
        self.read(|state| {
            let mut expired: Vec<Sprint> = state
                .sprints
                .values()
                .filter(|sprint| sprint.is_expired_at(now))
                .cloned()
                .collect();
            expired.sort_by_key(|sprint| (sprint.end_date(), sprint.id()));
            expired
        })
    }

    async fn find_transitions(
        &self,
        task_id: TaskId,
    ) -> TrackerRepositoryResult<Vec<TaskTransitionRecord>> {
        self.read(|state| {
            state
                .transitions
                .iter()
                .filter(|record| record.task_id() == task_id)
                .cloned()
                .collect()
        })
    }

    async fn commit(&self, changes: ChangeSet) -> TrackerRepositoryResult<()> {
        self.write(|state| {
            let mut scratch = state.clone();
            apply_task_changes(&mut scratch, &changes)?;
            apply_sprint_changes(&mut scratch, &changes)?;
            apply_project_changes(&mut scratch, &changes)?;
            *state = scratch;
            Ok(())
        })
    }
}
