//! When steps for sprint launch BDD scenarios.

use super::world::{SprintLaunchWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("the manager launches the sprint")]
fn manager_launches_sprint(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let manager_id = world.staff()?.manager.id();
    let sprint_id = world.sprint()?.id();

    let result = run_async(world.scheduler.launch_sprint(manager_id, sprint_id));
    if let Ok(ref launched) = result {
        world.sprint = Some(launched.clone());
    }
    world.last_launch_result = Some(result);
    Ok(())
}

#[when("the first task is completed")]
fn first_task_is_completed(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let staff = world.staff()?;
    let task_id = world
        .tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing first task in scenario world"))?
        .id();

    run_async(async {
        world
            .workflow
            .start_task(staff.worker.id(), task_id)
            .await?;
        world
            .workflow
            .mark_testing(staff.worker.id(), task_id)
            .await?;
        world
            .workflow
            .mark_complete(staff.tester.id(), task_id)
            .await
    })
    .wrap_err("complete first task")?;
    Ok(())
}
