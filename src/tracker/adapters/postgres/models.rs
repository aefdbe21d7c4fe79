//! Diesel row models for tracker persistence.

use super::schema::{project_members, projects, sprints, task_transitions, tasks, users};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Row for user accounts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    /// User identifier.
    pub id: uuid::Uuid,
    /// Login name.
    pub username: String,
    /// Project role.
    pub role: String,
}

/// Row for projects.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProjectRow {
    /// Project identifier.
    pub id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: uuid::Uuid,
    /// Whether the project has been closed out.
    pub is_complete: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency revision.
    pub revision: i64,
}

/// Row for project membership.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = project_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MemberRow {
    /// Project identifier.
    pub project_id: uuid::Uuid,
    /// Member identifier.
    pub user_id: uuid::Uuid,
}

/// Row for sprints.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = sprints)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct SprintRow {
    /// Sprint identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Planned length in weeks.
    pub duration_weeks: i16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Launch timestamp.
    pub start_date: Option<DateTime<Utc>>,
    /// Planned end.
    pub end_date: Option<DateTime<Utc>>,
    /// Launched and not yet completed.
    pub is_active: bool,
    /// Closed out.
    pub is_completed: bool,
    /// Optimistic concurrency revision.
    pub revision: i64,
}

/// Row for tasks.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Optional epic grouping.
    pub epic_id: Option<uuid::Uuid>,
    /// Display name.
    pub name: String,
    /// Scheduling priority.
    pub priority: i16,
    /// Lifecycle status.
    pub status: String,
    /// Prerequisite task.
    pub dependent_on: Option<uuid::Uuid>,
    /// Dependency relation kind.
    pub dependency_type: String,
    /// Assigned worker.
    pub worker_id: Option<uuid::Uuid>,
    /// Containing sprint.
    pub sprint_id: Option<uuid::Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency revision.
    pub revision: i64,
}

/// Query result row for transition history.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_transitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransitionRow {
    /// Task the record belongs to.
    pub task_id: uuid::Uuid,
    /// Status entered.
    pub status: String,
    /// When the status was entered.
    pub recorded_at: DateTime<Utc>,
}

/// Insert model for transition history.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_transitions)]
pub struct NewTransitionRow {
    /// Task the record belongs to.
    pub task_id: uuid::Uuid,
    /// Status entered.
    pub status: String,
    /// When the status was entered.
    pub recorded_at: DateTime<Utc>,
}
