//! Shared world state for sprint launch BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use sprintline::tracker::{
    adapters::{RepositoryPermissionGate, memory::InMemoryTrackerStore},
    domain::{Project, Sprint, Task, User},
    services::{SprintSchedulerService, TaskWorkflowService, TrackerServiceError},
};

type Gate = RepositoryPermissionGate<InMemoryTrackerStore>;

/// Workflow service used by the BDD world.
pub type TestWorkflow = TaskWorkflowService<InMemoryTrackerStore, Gate, DefaultClock>;

/// Scheduler used by the BDD world.
pub type TestScheduler = SprintSchedulerService<InMemoryTrackerStore, Gate, DefaultClock>;

/// People and project seeded by the background step.
pub struct Staff {
    pub manager: User,
    pub worker: User,
    pub tester: User,
    pub project: Project,
}

/// Scenario world for sprint launch behaviour tests.
pub struct SprintLaunchWorld {
    pub store: Arc<InMemoryTrackerStore>,
    pub workflow: TestWorkflow,
    pub scheduler: TestScheduler,
    pub staff: Option<Staff>,
    pub sprint: Option<Sprint>,
    pub tasks: Vec<Task>,
    pub dependent: Option<Task>,
    pub last_launch_result: Option<Result<Sprint, TrackerServiceError>>,
}

impl SprintLaunchWorld {
    /// Creates a world over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryTrackerStore::new());
        let gate = Arc::new(RepositoryPermissionGate::new(Arc::clone(&store)));
        let clock = Arc::new(DefaultClock);

        Self {
            workflow: TaskWorkflowService::new(
                Arc::clone(&store),
                Arc::clone(&gate),
                Arc::clone(&clock),
            ),
            scheduler: SprintSchedulerService::new(Arc::clone(&store), gate, clock),
            store,
            staff: None,
            sprint: None,
            tasks: Vec::new(),
            dependent: None,
            last_launch_result: None,
        }
    }

    /// Returns the seeded staff.
    pub fn staff(&self) -> Result<&Staff, eyre::Report> {
        self.staff
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing staffed project in scenario world"))
    }

    /// Returns the scenario sprint.
    pub fn sprint(&self) -> Result<&Sprint, eyre::Report> {
        self.sprint
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing sprint in scenario world"))
    }
}

impl Default for SprintLaunchWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SprintLaunchWorld {
    SprintLaunchWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
