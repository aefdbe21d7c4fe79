//! Dependency graph validation over a flat task table.
//!
//! Tasks point at their prerequisite by identifier only. The graph is a
//! snapshot of `task -> prerequisite` links and task statuses for one
//! project; it answers cycle and satisfaction questions without holding
//! references between tasks.

use super::{DependencyType, Task, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet};

/// Snapshot of prerequisite links and statuses for a set of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    prerequisites: HashMap<TaskId, TaskId>,
    statuses: HashMap<TaskId, TaskStatus>,
}

impl DependencyGraph {
    /// Builds a snapshot from `tasks`.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::default();
        for task in tasks {
            graph.insert(task);
        }
        graph
    }

    /// Adds or refreshes a single task in the snapshot.
    pub fn insert(&mut self, task: &Task) {
        self.statuses.insert(task.id(), task.status());
        match task.dependent_on() {
            Some(prerequisite) => {
                self.prerequisites.insert(task.id(), prerequisite);
            }
            None => {
                self.prerequisites.remove(&task.id());
            }
        }
    }

    /// Overrides the status recorded for `task_id`.
    pub fn set_status(&mut self, task_id: TaskId, status: TaskStatus) {
        self.statuses.insert(task_id, status);
    }

    /// Returns the recorded status of `task_id`, if known.
    #[must_use]
    pub fn status_of(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.get(&task_id).copied()
    }

    /// Returns the recorded prerequisite of `task_id`, if any.
    #[must_use]
    pub fn prerequisite_of(&self, task_id: TaskId) -> Option<TaskId> {
        self.prerequisites.get(&task_id).copied()
    }

    /// Returns whether making `task_id` depend on `proposed_prerequisite`
    /// would close a loop.
    ///
    /// Walks the single-parent chain starting at the proposed prerequisite.
    /// Reaching `task_id` or revisiting any node counts as a cycle, so the
    /// walk terminates on graphs that are already corrupt.
    #[must_use]
    pub fn has_cycle(&self, task_id: TaskId, proposed_prerequisite: TaskId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(proposed_prerequisite);
        while let Some(node) = current {
            if node == task_id || !visited.insert(node) {
                return true;
            }
            current = self.prerequisite_of(node);
        }
        false
    }

    /// Returns whether `task`'s prerequisite currently unblocks it.
    ///
    /// A missing prerequisite is reported as unsatisfied rather than as an
    /// error.
    #[must_use]
    pub fn is_satisfied(&self, task: &Task) -> bool {
        match task.dependency() {
            None => true,
            Some((prerequisite, kind)) => self.is_prerequisite_satisfied(prerequisite, kind),
        }
    }

    /// Returns whether a prerequisite of the given kind unblocks dependents.
    #[must_use]
    pub fn is_prerequisite_satisfied(&self, prerequisite: TaskId, kind: DependencyType) -> bool {
        match kind {
            DependencyType::None => true,
            DependencyType::FinishToStart | DependencyType::StartToStart => self
                .status_of(prerequisite)
                .is_some_and(|status| kind.is_satisfied_by(status)),
        }
    }
}
