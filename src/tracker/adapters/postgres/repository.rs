//! `PostgreSQL` repository implementation for tracker storage.

use super::{
    models::{MemberRow, NewTransitionRow, ProjectRow, SprintRow, TaskRow, TransitionRow, UserRow},
    schema::{project_members, projects, sprints, task_transitions, tasks, users},
};
use crate::tracker::{
    domain::{
        DependencyType, EntityRef, EpicId, PersistedProjectData, PersistedSprintData,
        PersistedTaskData, Project, ProjectId, Revision, Role, Sprint, SprintDuration, SprintId,
        SprintName, Task, TaskId, TaskName, TaskStatus, TaskTransitionRecord, User, UserId,
    },
    ports::{
        ChangeSet, Deletion, Revised, TrackerRepository, TrackerRepositoryError,
        TrackerRepositoryResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by tracker adapters.
pub type TrackerPgPool = Pool<ConnectionManager<PgConnection>>;

/// Partial unique index allowing one uncompleted sprint per project.
const ONE_OPEN_SPRINT_INDEX: &str = "idx_sprints_one_open_per_project";

/// `PostgreSQL`-backed tracker repository.
///
/// Every [`ChangeSet`] is applied inside one transaction. Updates and
/// deletions match on the expected revision, so a concurrent writer makes
/// the statement touch no rows and the whole transaction rolls back.
#[derive(Debug, Clone)]
pub struct PostgresTrackerRepository {
    pool: TrackerPgPool,
}

impl PostgresTrackerRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TrackerPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TrackerRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TrackerRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TrackerRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TrackerRepositoryError::persistence)?
    }
}

#[async_trait]
impl TrackerRepository for PostgresTrackerRepository {
    async fn store_user(&self, user: &User) -> TrackerRepositoryResult<()> {
        let entity = EntityRef::User(user.id());
        let row = UserRow {
            id: user.id().into_inner(),
            username: user.username().to_owned(),
            role: user.role().as_str().to_owned(),
        };

        self.run_blocking(move |connection| {
            diesel::insert_into(users::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| duplicate_or_persistence(err, entity))?;
            Ok(())
        })
        .await
    }

    async fn store_project(&self, project: &Project) -> TrackerRepositoryResult<()> {
        let entity = EntityRef::Project(project.id());
        let row = project_to_row(project)?;
        let members = member_rows(project);

        self.run_blocking(move |connection| {
            connection.transaction::<_, TrackerRepositoryError, _>(|tx| {
                diesel::insert_into(projects::table)
                    .values(&row)
                    .execute(tx)
                    .map_err(|err| duplicate_or_persistence(err, entity))?;
                diesel::insert_into(project_members::table)
                    .values(&members)
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }

    async fn find_user(&self, id: UserId) -> TrackerRepositoryResult<Option<User>> {
        self.run_blocking(move |connection| {
            let row = users::table
                .filter(users::id.eq(id.into_inner()))
                .select(UserRow::as_select())
                .first::<UserRow>(connection)
                .optional()?;
            row.map(row_to_user).transpose()
        })
        .await
    }

    async fn find_project(&self, id: ProjectId) -> TrackerRepositoryResult<Option<Project>> {
        self.run_blocking(move |connection| {
            let found = projects::table
                .filter(projects::id.eq(id.into_inner()))
                .select(ProjectRow::as_select())
                .first::<ProjectRow>(connection)
                .optional()?;
            let Some(row) = found else {
                return Ok(None);
            };
            let members = project_members::table
                .filter(project_members::project_id.eq(row.id))
                .select(MemberRow::as_select())
                .load::<MemberRow>(connection)?;
            row_to_project(row, &members).map(Some)
        })
        .await
    }

    async fn find_task(&self, id: TaskId) -> TrackerRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_tasks_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::project_id.eq(project_id.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn find_tasks_by_sprint(
        &self,
        sprint_id: SprintId,
    ) -> TrackerRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::sprint_id.eq(sprint_id.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn find_dependents(&self, prerequisite: TaskId) -> TrackerRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::dependent_on.eq(prerequisite.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn find_sprint(&self, id: SprintId) -> TrackerRepositoryResult<Option<Sprint>> {
        self.run_blocking(move |connection| {
            let row = sprints::table
                .filter(sprints::id.eq(id.into_inner()))
                .select(SprintRow::as_select())
                .first::<SprintRow>(connection)
                .optional()?;
            row.map(row_to_sprint).transpose()
        })
        .await
    }

    async fn find_sprints_by_project(
        &self,
        project_id: ProjectId,
    ) -> TrackerRepositoryResult<Vec<Sprint>> {
        self.run_blocking(move |connection| {
            let rows = sprints::table
                .filter(sprints::project_id.eq(project_id.into_inner()))
                .order((sprints::created_at.asc(), sprints::id.asc()))
                .select(SprintRow::as_select())
                .load::<SprintRow>(connection)?;
            rows.into_iter().map(row_to_sprint).collect()
        })
        .await
    }

    async fn find_expired_sprints(
        &self,
        now: DateTime<Utc>,
    ) -> TrackerRepositoryResult<Vec<Sprint>> {
        self.run_blocking(move |connection| {
            let rows = sprints::table
                .filter(sprints::is_active.eq(true))
                .filter(sprints::end_date.le(now))
                .order((sprints::end_date.asc(), sprints::id.asc()))
                .select(SprintRow::as_select())
                .load::<SprintRow>(connection)?;
            rows.into_iter().map(row_to_sprint).collect()
        })
        .await
    }

    async fn find_transitions(
        &self,
        task_id: TaskId,
    ) -> TrackerRepositoryResult<Vec<TaskTransitionRecord>> {
        self.run_blocking(move |connection| {
            let rows = task_transitions::table
                .filter(task_transitions::task_id.eq(task_id.into_inner()))
                .order(task_transitions::id.asc())
                .select(TransitionRow::as_select())
                .load::<TransitionRow>(connection)?;
            rows.into_iter().map(row_to_transition).collect()
        })
        .await
    }

    async fn commit(&self, changes: ChangeSet) -> TrackerRepositoryResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TrackerRepositoryError, _>(|tx| apply_changes(tx, &changes))
        })
        .await
    }
}

/// Applies a change set in foreign-key order.
///
/// Sprint rows land before the tasks that reference them, task references
/// are cleared before a sprint is deleted, and transition history is
/// removed with its task by `ON DELETE CASCADE`.
fn apply_changes(tx: &mut PgConnection, changes: &ChangeSet) -> TrackerRepositoryResult<()> {
    for sprint in changes.inserted_sprints() {
        let row = sprint_to_row(sprint)?;
        let project_id = sprint.project_id();
        diesel::insert_into(sprints::table)
            .values(&row)
            .execute(tx)
            .map_err(|err| sprint_write_error(err, EntityRef::Sprint(sprint.id()), project_id))?;
    }

    for update in changes.updated_sprints() {
        update_sprint(tx, update)?;
    }

    for update in changes.updated_tasks() {
        update_task(tx, update)?;
    }

    for task in changes.inserted_tasks() {
        let row = task_to_row(task)?;
        diesel::insert_into(tasks::table)
            .values(&row)
            .execute(tx)
            .map_err(|err| duplicate_or_persistence(err, EntityRef::Task(task.id())))?;
    }

    for deletion in changes.deleted_tasks() {
        delete_task(tx, *deletion)?;
    }

    for record in changes.transitions() {
        insert_transition(tx, record)?;
    }

    for deletion in changes.deleted_sprints() {
        delete_sprint(tx, *deletion)?;
    }

    for update in changes.updated_projects() {
        update_project(tx, update)?;
    }
    Ok(())
}

fn update_task(tx: &mut PgConnection, update: &Revised<Task>) -> TrackerRepositoryResult<()> {
    let task = update.value();
    let entity = EntityRef::Task(task.id());
    let row = task_to_row(task)?;
    let affected = diesel::update(
        tasks::table
            .filter(tasks::id.eq(row.id))
            .filter(tasks::revision.eq(revision_to_db(update.expected())?)),
    )
    .set(&row)
    .execute(tx)?;
    if affected == 0 {
        let exists = diesel::select(diesel::dsl::exists(tasks::table.filter(tasks::id.eq(row.id))))
            .get_result::<bool>(tx)?;
        return Err(missed_write(entity, update.expected(), exists));
    }
    Ok(())
}

fn delete_task(tx: &mut PgConnection, deletion: Deletion<TaskId>) -> TrackerRepositoryResult<()> {
    let id = deletion.id().into_inner();
    let affected = diesel::delete(
        tasks::table
            .filter(tasks::id.eq(id))
            .filter(tasks::revision.eq(revision_to_db(deletion.expected())?)),
    )
    .execute(tx)?;
    if affected == 0 {
        let exists = diesel::select(diesel::dsl::exists(tasks::table.filter(tasks::id.eq(id))))
            .get_result::<bool>(tx)?;
        return Err(missed_write(
            EntityRef::Task(deletion.id()),
            deletion.expected(),
            exists,
        ));
    }
    Ok(())
}

fn update_sprint(tx: &mut PgConnection, update: &Revised<Sprint>) -> TrackerRepositoryResult<()> {
    let sprint = update.value();
    let entity = EntityRef::Sprint(sprint.id());
    let row = sprint_to_row(sprint)?;
    let affected = diesel::update(
        sprints::table
            .filter(sprints::id.eq(row.id))
            .filter(sprints::revision.eq(revision_to_db(update.expected())?)),
    )
    .set(&row)
    .execute(tx)
    .map_err(|err| sprint_write_error(err, entity, sprint.project_id()))?;
    if affected == 0 {
        let exists =
            diesel::select(diesel::dsl::exists(sprints::table.filter(sprints::id.eq(row.id))))
                .get_result::<bool>(tx)?;
        return Err(missed_write(entity, update.expected(), exists));
    }
    Ok(())
}

fn delete_sprint(
    tx: &mut PgConnection,
    deletion: Deletion<SprintId>,
) -> TrackerRepositoryResult<()> {
    let id = deletion.id().into_inner();
    let affected = diesel::delete(
        sprints::table
            .filter(sprints::id.eq(id))
            .filter(sprints::revision.eq(revision_to_db(deletion.expected())?)),
    )
    .execute(tx)?;
    if affected == 0 {
        let exists = diesel::select(diesel::dsl::exists(sprints::table.filter(sprints::id.eq(id))))
            .get_result::<bool>(tx)?;
        return Err(missed_write(
            EntityRef::Sprint(deletion.id()),
            deletion.expected(),
            exists,
        ));
    }
    Ok(())
}

fn update_project(tx: &mut PgConnection, update: &Revised<Project>) -> TrackerRepositoryResult<()> {
    let project = update.value();
    let row = project_to_row(project)?;
    let affected = diesel::update(
        projects::table
            .filter(projects::id.eq(row.id))
            .filter(projects::revision.eq(revision_to_db(update.expected())?)),
    )
    .set(&row)
    .execute(tx)?;
    if affected == 0 {
        let exists =
            diesel::select(diesel::dsl::exists(projects::table.filter(projects::id.eq(row.id))))
                .get_result::<bool>(tx)?;
        return Err(missed_write(
            EntityRef::Project(project.id()),
            update.expected(),
            exists,
        ));
    }

    diesel::delete(project_members::table.filter(project_members::project_id.eq(row.id)))
        .execute(tx)?;
    diesel::insert_into(project_members::table)
        .values(&member_rows(project))
        .execute(tx)?;
    Ok(())
}

fn insert_transition(
    tx: &mut PgConnection,
    record: &TaskTransitionRecord,
) -> TrackerRepositoryResult<()> {
    let row = NewTransitionRow {
        task_id: record.task_id().into_inner(),
        status: record.status().as_str().to_owned(),
        recorded_at: record.recorded_at(),
    };
    diesel::insert_into(task_transitions::table)
        .values(&row)
        .execute(tx)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                TrackerRepositoryError::NotFound(EntityRef::Task(record.task_id()))
            }
            other => TrackerRepositoryError::persistence(other),
        })?;
    Ok(())
}

const fn missed_write(entity: EntityRef, expected: Revision, exists: bool) -> TrackerRepositoryError {
    if exists {
        TrackerRepositoryError::ConcurrentModification { entity, expected }
    } else {
        TrackerRepositoryError::NotFound(entity)
    }
}

fn duplicate_or_persistence(err: DieselError, entity: EntityRef) -> TrackerRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            TrackerRepositoryError::Duplicate(entity)
        }
        other => TrackerRepositoryError::persistence(other),
    }
}

fn sprint_write_error(
    err: DieselError,
    entity: EntityRef,
    project_id: ProjectId,
) -> TrackerRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if is_open_sprint_violation(info.as_ref()) =>
        {
            TrackerRepositoryError::OpenSprintExists(project_id)
        }
        other => duplicate_or_persistence(other, entity),
    }
}

fn is_open_sprint_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == ONE_OPEN_SPRINT_INDEX)
}

fn revision_to_db(revision: Revision) -> TrackerRepositoryResult<i64> {
    i64::try_from(revision.value()).map_err(TrackerRepositoryError::persistence)
}

fn revision_from_db(value: i64) -> TrackerRepositoryResult<Revision> {
    u64::try_from(value)
        .map(Revision::new)
        .map_err(TrackerRepositoryError::persistence)
}

fn member_rows(project: &Project) -> Vec<MemberRow> {
    project
        .members()
        .iter()
        .map(|member| MemberRow {
            project_id: project.id().into_inner(),
            user_id: member.into_inner(),
        })
        .collect()
}

fn project_to_row(project: &Project) -> TrackerRepositoryResult<ProjectRow> {
    Ok(ProjectRow {
        id: project.id().into_inner(),
        name: project.name().to_owned(),
        owner_id: project.owner_id().into_inner(),
        is_complete: project.is_complete(),
        created_at: project.created_at(),
        revision: revision_to_db(project.revision())?,
    })
}

fn sprint_to_row(sprint: &Sprint) -> TrackerRepositoryResult<SprintRow> {
    Ok(SprintRow {
        id: sprint.id().into_inner(),
        project_id: sprint.project_id().into_inner(),
        name: sprint.name().as_str().to_owned(),
        duration_weeks: i16::from(u8::from(sprint.duration())),
        created_at: sprint.created_at(),
        start_date: sprint.start_date(),
        end_date: sprint.end_date(),
        is_active: sprint.is_active(),
        is_completed: sprint.is_completed(),
        revision: revision_to_db(sprint.revision())?,
    })
}

fn task_to_row(task: &Task) -> TrackerRepositoryResult<TaskRow> {
    Ok(TaskRow {
        id: task.id().into_inner(),
        project_id: task.project_id().into_inner(),
        epic_id: task.epic_id().map(EpicId::into_inner),
        name: task.name().as_str().to_owned(),
        priority: i16::from(task.priority()),
        status: task.status().as_str().to_owned(),
        dependent_on: task.dependent_on().map(TaskId::into_inner),
        dependency_type: task.dependency_type().as_str().to_owned(),
        worker_id: task.worker_id().map(UserId::into_inner),
        sprint_id: task.sprint_id().map(SprintId::into_inner),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
        revision: revision_to_db(task.revision())?,
    })
}

fn row_to_user(row: UserRow) -> TrackerRepositoryResult<User> {
    let role = Role::try_from(row.role.as_str()).map_err(TrackerRepositoryError::persistence)?;
    User::with_id(UserId::from_uuid(row.id), row.username, role)
        .map_err(TrackerRepositoryError::persistence)
}

fn row_to_project(row: ProjectRow, members: &[MemberRow]) -> TrackerRepositoryResult<Project> {
    let data = PersistedProjectData {
        id: ProjectId::from_uuid(row.id),
        name: row.name,
        owner_id: UserId::from_uuid(row.owner_id),
        members: members
            .iter()
            .map(|member| UserId::from_uuid(member.user_id))
            .collect(),
        complete: row.is_complete,
        created_at: row.created_at,
        revision: revision_from_db(row.revision)?,
    };
    Ok(Project::from_persisted(data))
}

fn row_to_sprint(row: SprintRow) -> TrackerRepositoryResult<Sprint> {
    let weeks = u8::try_from(row.duration_weeks).map_err(TrackerRepositoryError::persistence)?;
    let data = PersistedSprintData {
        id: SprintId::from_uuid(row.id),
        project_id: ProjectId::from_uuid(row.project_id),
        name: SprintName::new(row.name).map_err(TrackerRepositoryError::persistence)?,
        duration: SprintDuration::try_from(weeks).map_err(TrackerRepositoryError::persistence)?,
        created_at: row.created_at,
        start_date: row.start_date,
        end_date: row.end_date,
        is_active: row.is_active,
        is_completed: row.is_completed,
        revision: revision_from_db(row.revision)?,
    };
    Ok(Sprint::from_persisted(data))
}

fn row_to_task(row: TaskRow) -> TrackerRepositoryResult<Task> {
    let TaskRow {
        id,
        project_id,
        epic_id,
        name,
        priority,
        status,
        dependent_on,
        dependency_type,
        worker_id,
        sprint_id,
        created_at,
        updated_at,
        revision,
    } = row;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        project_id: ProjectId::from_uuid(project_id),
        epic_id: epic_id.map(EpicId::from_uuid),
        name: TaskName::new(name).map_err(TrackerRepositoryError::persistence)?,
        priority: u8::try_from(priority).map_err(TrackerRepositoryError::persistence)?,
        status: TaskStatus::try_from(status.as_str())
            .map_err(TrackerRepositoryError::persistence)?,
        dependent_on: dependent_on.map(TaskId::from_uuid),
        dependency_type: DependencyType::try_from(dependency_type.as_str())
            .map_err(TrackerRepositoryError::persistence)?,
        worker_id: worker_id.map(UserId::from_uuid),
        sprint_id: sprint_id.map(SprintId::from_uuid),
        created_at,
        updated_at,
        revision: revision_from_db(revision)?,
    };
    Ok(Task::from_persisted(data))
}

fn row_to_transition(row: TransitionRow) -> TrackerRepositoryResult<TaskTransitionRecord> {
    let status =
        TaskStatus::try_from(row.status.as_str()).map_err(TrackerRepositoryError::persistence)?;
    Ok(TaskTransitionRecord::new(
        TaskId::from_uuid(row.task_id),
        status,
        row.recorded_at,
    ))
}
