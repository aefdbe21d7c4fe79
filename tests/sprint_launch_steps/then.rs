//! Then steps for sprint launch BDD scenarios.

use super::world::{SprintLaunchWorld, run_async};
use rstest_bdd_macros::then;
use sprintline::tracker::{
    domain::{SprintState, TaskStatus},
    ports::TrackerRepository,
    services::{Precondition, TrackerServiceError},
};

fn expected_status(status: &str) -> Result<TaskStatus, eyre::Report> {
    TaskStatus::try_from(status)
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))
}

fn stored_state(world: &SprintLaunchWorld) -> Result<SprintState, eyre::Report> {
    let sprint_id = world.sprint()?.id();
    let stored = run_async(world.store.find_sprint(sprint_id))?
        .ok_or_else(|| eyre::eyre!("sprint {sprint_id} missing from store"))?;
    Ok(stored.state())
}

#[then("the sprint is active")]
fn sprint_is_active(world: &SprintLaunchWorld) -> Result<(), eyre::Report> {
    let state = stored_state(world)?;
    if state != SprintState::Active {
        return Err(eyre::eyre!("expected an active sprint, found {state}"));
    }
    Ok(())
}

#[then("the sprint is still a draft")]
fn sprint_is_still_draft(world: &SprintLaunchWorld) -> Result<(), eyre::Report> {
    let state = stored_state(world)?;
    if state != SprintState::Draft {
        return Err(eyre::eyre!("expected a draft sprint, found {state}"));
    }
    Ok(())
}

#[then(r#"every sprint task is "{status}""#)]
fn every_sprint_task_is(world: &SprintLaunchWorld, status: String) -> Result<(), eyre::Report> {
    let expected = expected_status(&status)?;
    let sprint_id = world.sprint()?.id();
    let tasks = run_async(world.store.find_tasks_by_sprint(sprint_id))?;
    if tasks.is_empty() {
        return Err(eyre::eyre!("sprint {sprint_id} holds no tasks"));
    }
    if let Some(task) = tasks.iter().find(|task| task.status() != expected) {
        return Err(eyre::eyre!(
            "expected every task to be {expected}, task {} is {}",
            task.id(),
            task.status()
        ));
    }
    Ok(())
}

#[then(r#"the dependent task is "{status}""#)]
fn dependent_task_is(world: &SprintLaunchWorld, status: String) -> Result<(), eyre::Report> {
    let expected = expected_status(&status)?;
    let task_id = world
        .dependent
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing dependent task in scenario world"))?
        .id();
    let stored = run_async(world.store.find_task(task_id))?
        .ok_or_else(|| eyre::eyre!("task {task_id} missing from store"))?;
    if stored.status() != expected {
        return Err(eyre::eyre!(
            "expected dependent task to be {expected}, found {}",
            stored.status()
        ));
    }
    Ok(())
}

#[then("the launch fails because the sprint holds too few tasks")]
fn launch_fails_with_too_few_tasks(world: &SprintLaunchWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_launch_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing launch result"))?;

    if !matches!(
        result,
        Err(TrackerServiceError::PreconditionFailed(
            Precondition::InsufficientTasks { .. }
        ))
    ) {
        return Err(eyre::eyre!("expected InsufficientTasks, got {result:?}"));
    }
    Ok(())
}

#[then("the launch fails because a task has no worker")]
fn launch_fails_with_unassigned_task(world: &SprintLaunchWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_launch_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing launch result"))?;

    if !matches!(
        result,
        Err(TrackerServiceError::PreconditionFailed(
            Precondition::UnassignedWorkers { .. }
        ))
    ) {
        return Err(eyre::eyre!("expected UnassignedWorkers, got {result:?}"));
    }
    Ok(())
}
