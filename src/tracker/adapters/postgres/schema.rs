//! Diesel schema for tracker persistence.

diesel::table! {
    /// User accounts.
    users (id) {
        /// User identifier.
        id -> Uuid,
        /// Login name.
        #[max_length = 100]
        username -> Varchar,
        /// Project role.
        #[max_length = 20]
        role -> Varchar,
    }
}

diesel::table! {
    /// Projects.
    projects (id) {
        /// Project identifier.
        id -> Uuid,
        /// Display name.
        #[max_length = 100]
        name -> Varchar,
        /// Owning user.
        owner_id -> Uuid,
        /// Whether the project has been closed out.
        is_complete -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Optimistic concurrency revision.
        revision -> Int8,
    }
}

diesel::table! {
    /// Project membership, owner included.
    project_members (project_id, user_id) {
        /// Project identifier.
        project_id -> Uuid,
        /// Member identifier.
        user_id -> Uuid,
    }
}

diesel::table! {
    /// Sprints.
    sprints (id) {
        /// Sprint identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Display name.
        #[max_length = 100]
        name -> Varchar,
        /// Planned length in weeks.
        duration_weeks -> Int2,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Launch timestamp.
        start_date -> Nullable<Timestamptz>,
        /// Planned end, fixed at launch.
        end_date -> Nullable<Timestamptz>,
        /// Launched and not yet completed.
        is_active -> Bool,
        /// Closed out.
        is_completed -> Bool,
        /// Optimistic concurrency revision.
        revision -> Int8,
    }
}

diesel::table! {
    /// Tasks.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Optional epic grouping.
        epic_id -> Nullable<Uuid>,
        /// Display name.
        #[max_length = 100]
        name -> Varchar,
        /// Scheduling priority.
        priority -> Int2,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Prerequisite task.
        dependent_on -> Nullable<Uuid>,
        /// Dependency relation kind.
        #[max_length = 10]
        dependency_type -> Varchar,
        /// Assigned worker.
        worker_id -> Nullable<Uuid>,
        /// Containing sprint.
        sprint_id -> Nullable<Uuid>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Optimistic concurrency revision.
        revision -> Int8,
    }
}

diesel::table! {
    /// Append-only task status history.
    task_transitions (id) {
        /// Insertion order.
        id -> Int8,
        /// Task the record belongs to.
        task_id -> Uuid,
        /// Status entered.
        #[max_length = 20]
        status -> Varchar,
        /// When the status was entered.
        recorded_at -> Timestamptz,
    }
}
