//! In-memory integration tests for sprint expiry and the monitor loop.

use super::helpers::{Gate, Tracker};
use chrono::TimeDelta;
use eyre::ensure;
use rstest::rstest;
use sprintline::tracker::{
    adapters::{
        RepositoryPermissionGate,
        memory::{InMemoryTrackerStore, ManualClock},
    },
    domain::{SprintState, TaskStatus},
    services::{SprintExpirationMonitor, SprintSchedulerService},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Monitor = SprintExpirationMonitor<InMemoryTrackerStore, Gate, ManualClock>;

fn monitor(tracker: &Tracker) -> Monitor {
    let scheduler = SprintSchedulerService::new(
        Arc::clone(&tracker.store),
        Arc::new(RepositoryPermissionGate::new(Arc::clone(&tracker.store))),
        Arc::clone(&tracker.clock),
    );
    SprintExpirationMonitor::new(scheduler, Duration::from_millis(10))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sweep_before_end_date_is_idle() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Fresh", 6).await?;
    tracker.clock.advance(TimeDelta::days(6));

    let report = monitor(&tracker).run_cycle().await;

    ensure!(report.is_idle());
    ensure!(tracker.reload_sprint(sprint.id()).await?.is_active());
    Ok(())
}

#[rstest]
#[case(TimeDelta::zero())]
#[case(TimeDelta::hours(3))]
#[tokio::test(flavor = "multi_thread")]
async fn sweep_completes_sprint_at_or_after_end_date(
    #[case] overrun: TimeDelta,
) -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Due", 6).await?;
    tracker.clock.advance(TimeDelta::weeks(1) + overrun);

    let report = monitor(&tracker).run_cycle().await;

    ensure!(report.expired == vec![sprint.id()]);
    ensure!(report.failed.is_empty());
    ensure!(tracker.reload_sprint(sprint.id()).await?.state() == SprintState::Completed);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expiry_releases_unfinished_tasks_as_they_are() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, tasks) = tracker.launched("Overrun", 6).await?;
    let mut ids = tasks.iter().map(|task| task.id());
    let finished = ids.next().ok_or_else(|| eyre::eyre!("missing task"))?;
    let started = ids.next().ok_or_else(|| eyre::eyre!("missing task"))?;
    tracker.finish(finished).await?;
    tracker
        .workflow
        .start_task(tracker.worker.id(), started)
        .await?;
    let started_history = tracker.history(started).await?;
    tracker.clock.advance(TimeDelta::weeks(2));

    let expired = tracker
        .scheduler
        .expire_sprint(sprint.id())
        .await?
        .ok_or_else(|| eyre::eyre!("sprint should be due"))?;

    ensure!(expired.sprint().is_completed());
    ensure!(expired.released_tasks().len() == 5);
    ensure!(!expired.released_tasks().contains(&finished));

    let kept = tracker.reload(finished).await?;
    ensure!(kept.sprint_id() == Some(sprint.id()));
    let released = tracker.reload(started).await?;
    ensure!(released.sprint_id().is_none());
    ensure!(released.status() == TaskStatus::InProgress);
    ensure!(tracker.history(started).await? == started_history);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expiring_twice_is_a_no_op() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Closed", 6).await?;
    tracker.clock.advance(TimeDelta::weeks(1));

    ensure!(tracker.scheduler.expire_sprint(sprint.id()).await?.is_some());
    ensure!(tracker.scheduler.expire_sprint(sprint.id()).await?.is_none());
    ensure!(tracker.scheduler.due_sprints().await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn released_tasks_can_join_the_next_sprint() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (first, tasks) = tracker.launched("First", 6).await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    monitor(&tracker).run_cycle().await;

    let second = tracker.draft("Second").await?;
    for task in &tasks {
        tracker
            .scheduler
            .add_task(tracker.manager.id(), second.id(), task.id())
            .await?;
    }
    let launched = tracker.launch(second.id()).await?;

    ensure!(tracker.reload_sprint(first.id()).await?.is_completed());
    ensure!(launched.is_active());
    ensure!(tracker.scheduler.tasks_in_sprint(second.id()).await?.len() == 6);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn monitor_loop_expires_due_sprints_until_cancelled() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Background", 6).await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    let shutdown = CancellationToken::new();
    let handle = monitor(&tracker).spawn(shutdown.clone());

    let mut completed = false;
    for _ in 0..100 {
        if tracker.reload_sprint(sprint.id()).await?.is_completed() {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;

    ensure!(completed, "monitor did not expire the sprint");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_monitor_exits_without_sweeping() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, _) = tracker.launched("Idle", 6).await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), monitor(&tracker).run(shutdown)).await?;

    ensure!(tracker.reload_sprint(sprint.id()).await?.is_active());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_under_test_keeps_its_status_through_relaunch() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (first, tasks) = tracker.launched("Before", 6).await?;
    let reviewed = tasks
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?
        .id();
    tracker
        .workflow
        .start_task(tracker.worker.id(), reviewed)
        .await?;
    tracker
        .workflow
        .mark_testing(tracker.worker.id(), reviewed)
        .await?;
    tracker.clock.advance(TimeDelta::weeks(1));
    ensure!(tracker.scheduler.expire_sprint(first.id()).await?.is_some());
    let recorded = tracker.history(reviewed).await?;

    let second = tracker.draft("After").await?;
    for task in &tasks {
        tracker
            .scheduler
            .add_task(tracker.manager.id(), second.id(), task.id())
            .await?;
    }
    tracker.launch(second.id()).await?;

    ensure!(tracker.reload(reviewed).await?.status() == TaskStatus::Testing);
    ensure!(tracker.history(reviewed).await? == recorded);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expiry_keeps_every_completed_task_attached() -> eyre::Result<()> {
    let tracker = Tracker::seeded().await?;
    let (sprint, tasks) = tracker.launched("Mixed results", 6).await?;
    let (done, open) = tasks.split_at(2);
    for task in done {
        tracker.finish(task.id()).await?;
    }
    tracker.clock.advance(TimeDelta::weeks(1));

    let expired = tracker
        .scheduler
        .expire_sprint(sprint.id())
        .await?
        .ok_or_else(|| eyre::eyre!("sprint should be due"))?;

    ensure!(expired.released_tasks().len() == open.len());
    let remaining = tracker.scheduler.tasks_in_sprint(sprint.id()).await?;
    ensure!(remaining.len() == done.len());
    ensure!(
        remaining
            .iter()
            .all(|task| task.status() == TaskStatus::Complete)
    );
    for task in open {
        ensure!(tracker.reload(task.id()).await?.sprint_id().is_none());
    }
    Ok(())
}
