//! In-memory integration tests for sprint launch gating.

use super::helpers::{Tracker, start_instant};
use chrono::TimeDelta;
use eyre::ensure;
use rstest::rstest;
use sprintline::config::SchedulerConfig;
use sprintline::tracker::{
    domain::{DependencyType, SprintDuration, SprintState, TaskStatus},
    ports::{ChangeSet, TrackerRepository},
    services::{CreateSprintRequest, CreateTaskRequest, Denial, Precondition, TrackerServiceError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn five_tasks_are_not_enough_to_launch() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Too small").await?;
    tracker.fill(sprint.id(), 5).await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.manager.id(), sprint.id())
        .await;

    ensure!(matches!(
        result,
        Err(TrackerServiceError::PreconditionFailed(Precondition::InsufficientTasks {
            found: 5,
            required: 6,
            ..
        }))
    ));
    ensure!(tracker.reload_sprint(sprint.id()).await?.state() == SprintState::Draft);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn six_tasks_launch_and_become_available() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Big enough").await?;
    let tasks = tracker.fill(sprint.id(), 6).await?;

    let launched = tracker.launch(sprint.id()).await?;

    ensure!(launched.state() == SprintState::Active);
    ensure!(launched.start_date() == Some(start_instant()));
    ensure!(launched.end_date() == Some(start_instant() + TimeDelta::weeks(1)));
    ensure!(tracker.reload_sprint(sprint.id()).await? == launched);
    for task in &tasks {
        ensure!(tracker.reload(task.id()).await?.status() == TaskStatus::Available);
        ensure!(tracker.history(task.id()).await? == vec![TaskStatus::Available]);
    }
    Ok(())
}

#[rstest]
#[case(SprintDuration::OneWeek, 1)]
#[case(SprintDuration::FourWeeks, 4)]
#[tokio::test(flavor = "multi_thread")]
async fn launch_sets_end_date_from_duration(
    #[case] duration: SprintDuration,
    #[case] weeks: i64,
) -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker
        .scheduler
        .create_sprint(
            tracker.manager.id(),
            CreateSprintRequest::new(tracker.project.id(), "Sized").with_duration(duration),
        )
        .await?;
    tracker.fill(sprint.id(), 6).await?;

    let launched = tracker.launch(sprint.id()).await?;

    ensure!(launched.end_date() == Some(start_instant() + TimeDelta::weeks(weeks)));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unassigned_tasks_block_launch() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Unstaffed").await?;
    tracker.fill(sprint.id(), 5).await?;
    let orphan = tracker
        .workflow
        .create_task(
            tracker.manager.id(),
            CreateTaskRequest::new(tracker.project.id(), "Orphan")
                .in_sprint(sprint.id()),
        )
        .await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.manager.id(), sprint.id())
        .await;

    match result {
        Err(TrackerServiceError::PreconditionFailed(Precondition::UnassignedWorkers {
            tasks,
            ..
        })) => ensure!(tasks == vec![orphan.id()]),
        other => eyre::bail!("expected unassigned workers, got {other:?}"),
    }
    ensure!(tracker.reload(orphan.id()).await?.status() == TaskStatus::NotAvailable);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unfinished_prerequisite_outside_sprint_blocks_launch() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let outside = tracker.task("Outside work").await?;
    let sprint = tracker.draft("Blocked").await?;
    tracker.fill(sprint.id(), 5).await?;
    let dependent = tracker
        .dependent_in(
            sprint.id(),
            "Needs outside",
            outside.id(),
            DependencyType::FinishToStart,
        )
        .await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.manager.id(), sprint.id())
        .await;

    match result {
        Err(TrackerServiceError::DependencyValidationFailed { violations, .. }) => {
            ensure!(violations.len() == 1);
            let violation = violations
                .first()
                .ok_or_else(|| eyre::eyre!("missing violation"))?;
            ensure!(violation.task_id == dependent.id());
            ensure!(violation.prerequisite == outside.id());
            ensure!(violation.prerequisite_status == Some(TaskStatus::NotAvailable));
        }
        other => eyre::bail!("expected dependency violations, got {other:?}"),
    }
    ensure!(tracker.history(dependent.id()).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_dependency_violation_is_reported() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let outside = tracker.task("Outside work").await?;
    let vanished = tracker.task("Vanished work").await?;
    let sprint = tracker.draft("Doubly blocked").await?;
    tracker.fill(sprint.id(), 4).await?;
    let needs_outside = tracker
        .dependent_in(sprint.id(), "Needs outside", outside.id(), DependencyType::FinishToStart)
        .await?;
    let needs_vanished = tracker
        .dependent_in(sprint.id(), "Needs vanished", vanished.id(), DependencyType::StartToStart)
        .await?;
    // Removed straight from the store so the dependent keeps its dangling link.
    let mut changes = ChangeSet::new();
    changes.delete_task(&vanished);
    tracker.store.commit(changes).await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.manager.id(), sprint.id())
        .await;

    let violations = match result {
        Err(TrackerServiceError::DependencyValidationFailed { violations, .. }) => violations,
        other => eyre::bail!("expected dependency violations, got {other:?}"),
    };
    ensure!(violations.len() == 2);
    ensure!(violations.iter().any(|violation| {
        violation.task_id == needs_outside.id()
            && violation.prerequisite == outside.id()
            && violation.prerequisite_status == Some(TaskStatus::NotAvailable)
    }));
    ensure!(violations.iter().any(|violation| {
        violation.task_id == needs_vanished.id()
            && violation.prerequisite == vanished.id()
            && violation.prerequisite_status.is_none()
    }));
    ensure!(tracker.reload_sprint(sprint.id()).await?.state() == SprintState::Draft);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_prerequisite_from_earlier_sprint_satisfies_launch() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (first, tasks) = tracker.launched("First sprint", 6).await?;
    let prerequisite = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    tracker.finish(prerequisite).await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    ensure!(tracker.scheduler.expire_sprint(first.id()).await?.is_some());

    let second = tracker.draft("Second sprint").await?;
    tracker.fill(second.id(), 5).await?;
    let dependent = tracker
        .dependent_in(
            second.id(),
            "Builds on first",
            prerequisite,
            DependencyType::FinishToStart,
        )
        .await?;
    tracker.launch(second.id()).await?;

    ensure!(tracker.reload(dependent.id()).await?.status() == TaskStatus::Available);
    Ok(())
}

#[rstest]
#[case(DependencyType::FinishToStart)]
#[case(DependencyType::StartToStart)]
#[tokio::test(flavor = "multi_thread")]
async fn prerequisite_inside_sprint_puts_dependent_on_wait(
    #[case] kind: DependencyType,
) -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Chained").await?;
    let tasks = tracker.fill(sprint.id(), 5).await?;
    let prerequisite = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    let dependent = tracker
        .dependent_in(sprint.id(), "Follower", prerequisite, kind)
        .await?;

    tracker.launch(sprint.id()).await?;

    ensure!(tracker.reload(prerequisite).await?.status() == TaskStatus::Available);
    ensure!(tracker.reload(dependent.id()).await?.status() == TaskStatus::Wait);
    ensure!(tracker.history(dependent.id()).await? == vec![TaskStatus::Wait]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn active_sprint_cannot_launch_again() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Once only", 6).await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.manager.id(), sprint.id())
        .await;

    ensure!(matches!(result, Err(TrackerServiceError::InvalidTransition(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_sprint_blocks_a_second_draft() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    tracker.draft("Current").await?;

    let result = tracker
        .scheduler
        .create_sprint(
            tracker.manager.id(),
            CreateSprintRequest::new(tracker.project.id(), "Next"),
        )
        .await;

    ensure!(matches!(
        result,
        Err(TrackerServiceError::SprintConflict(id)) if id == tracker.project.id()
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn launch_minimum_follows_configuration() -> eyre::Result<()> {
    let config = SchedulerConfig {
        min_launch_tasks: 2,
        ..SchedulerConfig::default()
    };
    let tracker = Tracker::with_config(&config).await?;
    ensure!(tracker.scheduler.min_launch_tasks() == 2);

    let (sprint, _) = tracker.launched("Small team", 2).await?;

    ensure!(sprint.is_active());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn developers_cannot_launch_sprints() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let sprint = tracker.draft("Guarded").await?;
    tracker.fill(sprint.id(), 6).await?;

    let result = tracker
        .scheduler
        .launch_sprint(tracker.worker.id(), sprint.id())
        .await;

    ensure!(matches!(
        result,
        Err(TrackerServiceError::Forbidden(Denial::NotProjectManager { user_id, .. }))
            if user_id == tracker.worker.id()
    ));
    Ok(())
}
