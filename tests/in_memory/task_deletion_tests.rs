//! In-memory integration tests for task and sprint deletion.

use super::helpers::Tracker;
use chrono::TimeDelta;
use eyre::ensure;
use rstest::rstest;
use sprintline::tracker::{
    domain::{DependencyType, EntityRef, TaskStatus},
    ports::TrackerRepository,
    services::{Precondition, TrackerServiceError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_prerequisite_releases_waiting_dependents() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Pruned").await?;
    let tasks = tracker.fill(sprint.id(), 5).await?;
    let prerequisite = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    let dependent = tracker
        .dependent_in(sprint.id(), "Left behind", prerequisite, DependencyType::FinishToStart)
        .await?;
    tracker.launch(sprint.id()).await?;

    let detached = tracker
        .workflow
        .delete_task(tracker.manager.id(), prerequisite)
        .await?;

    ensure!(detached.len() == 1);
    let released = tracker.reload(dependent.id()).await?;
    ensure!(released.status() == TaskStatus::Available);
    ensure!(released.dependency().is_none());
    ensure!(detached.first() == Some(&released));
    ensure!(tracker.store.find_task(prerequisite).await?.is_none());
    ensure!(tracker.store.find_transitions(prerequisite).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_prerequisite_detaches_every_dependent() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Fan out").await?;
    let tasks = tracker.fill(sprint.id(), 4).await?;
    let prerequisite = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    let finish_waiter = tracker
        .dependent_in(sprint.id(), "Waits for finish", prerequisite, DependencyType::FinishToStart)
        .await?;
    let start_waiter = tracker
        .dependent_in(sprint.id(), "Waits for start", prerequisite, DependencyType::StartToStart)
        .await?;
    tracker.launch(sprint.id()).await?;

    let mut backlog = Vec::new();
    for (name, kind) in [
        ("Backlog finish", DependencyType::FinishToStart),
        ("Backlog start", DependencyType::StartToStart),
    ] {
        let task = tracker.task(name).await?;
        tracker
            .workflow
            .update_dependency(tracker.manager.id(), task.id(), Some(prerequisite), kind)
            .await?;
        backlog.push(task.id());
    }
    for waiter in [finish_waiter.id(), start_waiter.id()] {
        ensure!(tracker.history(waiter).await? == vec![TaskStatus::Wait]);
    }

    let detached = tracker
        .workflow
        .delete_task(tracker.manager.id(), prerequisite)
        .await?;

    ensure!(detached.len() == 4);
    ensure!(detached.iter().all(|task| task.dependency().is_none()));
    for waiter in [finish_waiter.id(), start_waiter.id()] {
        let released = tracker.reload(waiter).await?;
        ensure!(released.status() == TaskStatus::Available);
        ensure!(released.dependency().is_none());
        ensure!(tracker.history(waiter).await? == vec![TaskStatus::Wait, TaskStatus::Available]);
    }
    for task_id in backlog {
        let untouched = tracker.reload(task_id).await?;
        ensure!(untouched.status() == TaskStatus::NotAvailable);
        ensure!(untouched.dependency().is_none());
        ensure!(tracker.history(task_id).await?.is_empty());
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_prerequisite_outside_sprints_only_detaches() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let prerequisite = tracker.task("Doomed").await?;
    let dependent = tracker.task("Survivor").await?;
    tracker
        .workflow
        .update_dependency(
            tracker.manager.id(),
            dependent.id(),
            Some(prerequisite.id()),
            DependencyType::StartToStart,
        )
        .await?;

    tracker
        .workflow
        .delete_task(tracker.manager.id(), prerequisite.id())
        .await?;

    let survivor = tracker.reload(dependent.id()).await?;
    ensure!(survivor.status() == TaskStatus::NotAvailable);
    ensure!(survivor.dependency_type() == DependencyType::None);
    ensure!(tracker.history(dependent.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_task_has_no_history() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let task = tracker.task("Ephemeral").await?;
    tracker
        .workflow
        .delete_task(tracker.manager.id(), task.id())
        .await?;

    let result = tracker.workflow.task_history(task.id()).await;

    ensure!(matches!(
        result,
        Err(TrackerServiceError::NotFound(EntityRef::Task(id))) if id == task.id()
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_draft_sprint_releases_its_tasks() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Abandoned").await?;
    let tasks = tracker.fill(sprint.id(), 3).await?;

    tracker
        .scheduler
        .delete_sprint(tracker.manager.id(), sprint.id())
        .await?;

    ensure!(tracker.scheduler.find_sprint(sprint.id()).await?.is_none());
    for task in &tasks {
        ensure!(tracker.reload(task.id()).await?.sprint_id().is_none());
    }
    tracker.draft("Replacement").await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn active_sprints_cannot_be_deleted() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Underway", 6).await?;

    let result = tracker
        .scheduler
        .delete_sprint(tracker.manager.id(), sprint.id())
        .await;

    ensure!(matches!(
        result,
        Err(TrackerServiceError::PreconditionFailed(Precondition::SprintActive(id)))
            if id == sprint.id()
    ));
    ensure!(tracker.reload_sprint(sprint.id()).await?.is_active());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_completed_sprint_detaches_finished_tasks() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, tasks) = tracker.launched("Shipped", 6).await?;
    let done = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    tracker.finish(done).await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    tracker.scheduler.expire_sprint(sprint.id()).await?;
    ensure!(tracker.reload(done).await?.sprint_id() == Some(sprint.id()));
    let recorded = tracker.history(done).await?;

    tracker
        .scheduler
        .delete_sprint(tracker.manager.id(), sprint.id())
        .await?;

    let finished = tracker.reload(done).await?;
    ensure!(finished.sprint_id().is_none());
    ensure!(finished.status() == TaskStatus::Complete);
    ensure!(tracker.history(done).await? == recorded);
    ensure!(tracker.scheduler.find_sprint(sprint.id()).await?.is_none());
    Ok(())
}
