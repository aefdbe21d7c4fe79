//! Given steps for sprint launch BDD scenarios.

use super::world::{SprintLaunchWorld, Staff, run_async};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;
use sprintline::tracker::{
    domain::{DependencyType, Project, Role, User},
    ports::TrackerRepository,
    services::{CreateSprintRequest, CreateTaskRequest},
};

#[given("a staffed project")]
fn staffed_project(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let manager = User::new("maria", Role::Manager)?;
    let worker = User::new("wes", Role::Developer)?;
    let tester = User::new("tara", Role::Tester)?;
    let project = Project::new("Scenario project", manager.id(), &DefaultClock)?
        .with_members([worker.id(), tester.id()]);

    run_async(async {
        for user in [&manager, &worker, &tester] {
            world.store.store_user(user).await?;
        }
        world.store.store_project(&project).await
    })
    .wrap_err("seed staffed project")?;

    world.staff = Some(Staff {
        manager,
        worker,
        tester,
        project,
    });
    Ok(())
}

#[given("a draft sprint holding {count:usize} assigned tasks")]
fn draft_sprint_with_tasks(
    world: &mut SprintLaunchWorld,
    count: usize,
) -> Result<(), eyre::Report> {
    let staff = world.staff()?;
    let manager_id = staff.manager.id();
    let worker_id = staff.worker.id();
    let project_id = staff.project.id();

    let sprint = run_async(world.scheduler.create_sprint(
        manager_id,
        CreateSprintRequest::new(project_id, "Scenario sprint"),
    ))
    .wrap_err("draft sprint")?;

    let mut tasks = Vec::with_capacity(count);
    for index in 0..count {
        let request = CreateTaskRequest::new(project_id, format!("Scenario task {index}"))
            .with_worker(worker_id)
            .in_sprint(sprint.id());
        tasks.push(
            run_async(world.workflow.create_task(manager_id, request))
                .wrap_err("create sprint task")?,
        );
    }

    world.sprint = Some(sprint);
    world.tasks = tasks;
    Ok(())
}

#[given("the sprint also holds an unassigned task")]
fn sprint_holds_unassigned_task(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let staff = world.staff()?;
    let request = CreateTaskRequest::new(staff.project.id(), "Nobody's task")
        .in_sprint(world.sprint()?.id());
    let task = run_async(world.workflow.create_task(staff.manager.id(), request))
        .wrap_err("create unassigned task")?;
    world.tasks.push(task);
    Ok(())
}

#[given("the sprint also holds a task depending on the first task")]
fn sprint_holds_dependent_task(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let staff = world.staff()?;
    let prerequisite = world
        .tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing first task in scenario world"))?;
    let request = CreateTaskRequest::new(staff.project.id(), "Follow-up task")
        .with_worker(staff.worker.id())
        .in_sprint(world.sprint()?.id())
        .with_dependency(prerequisite.id(), DependencyType::FinishToStart);
    let task = run_async(world.workflow.create_task(staff.manager.id(), request))
        .wrap_err("create dependent task")?;
    world.dependent = Some(task);
    Ok(())
}

#[given("the sprint has been launched")]
fn sprint_has_been_launched(world: &mut SprintLaunchWorld) -> Result<(), eyre::Report> {
    let manager_id = world.staff()?.manager.id();
    let sprint_id = world.sprint()?.id();
    let launched = run_async(world.scheduler.launch_sprint(manager_id, sprint_id))
        .wrap_err("launch sprint in scenario setup")?;
    world.sprint = Some(launched);
    Ok(())
}
