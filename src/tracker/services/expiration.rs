//! Background sweep that closes out sprints past their end date.

use super::sprint_scheduler::SprintSchedulerService;
use crate::tracker::{
    domain::SprintId,
    ports::{PermissionGate, TrackerRepository},
};
use mockable::Clock;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirationReport {
    /// Sprints completed by this sweep.
    pub expired: Vec<SprintId>,
    /// Sprints whose close-out failed; they are retried next sweep.
    pub failed: Vec<SprintId>,
    /// Whether the due-sprint query itself failed.
    pub query_failed: bool,
}

impl ExpirationReport {
    /// Returns whether the sweep touched nothing and hit no errors.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.expired.is_empty() && self.failed.is_empty() && !self.query_failed
    }
}

/// Periodically expires active sprints whose end date has passed.
///
/// A failure on one sprint is logged and does not stop the sweep. The loop
/// stops between sweeps once its cancellation token fires.
pub struct SprintExpirationMonitor<R, P, C>
where
    R: TrackerRepository,
    P: PermissionGate,
    C: Clock + Send + Sync,
{
    scheduler: SprintSchedulerService<R, P, C>,
    interval: Duration,
}

impl<R, P, C> SprintExpirationMonitor<R, P, C>
where
    R: TrackerRepository + 'static,
    P: PermissionGate + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a monitor sweeping every `interval`.
    #[must_use]
    pub const fn new(scheduler: SprintSchedulerService<R, P, C>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// Runs a single sweep.
    pub async fn run_cycle(&self) -> ExpirationReport {
        let mut report = ExpirationReport::default();
        let due = match self.scheduler.due_sprints().await {
            Ok(sprints) => sprints,
            Err(err) => {
                warn!(error = %err, "failed to query expired sprints");
                report.query_failed = true;
                return report;
            }
        };

        for sprint in due {
            match self.scheduler.expire_sprint(sprint.id()).await {
                Ok(Some(_)) => report.expired.push(sprint.id()),
                Ok(None) => debug!(sprint_id = %sprint.id(), "sprint no longer due"),
                Err(err) => {
                    warn!(sprint_id = %sprint.id(), error = %err, "failed to expire sprint");
                    report.failed.push(sprint.id());
                }
            }
        }
        report
    }

    /// Sweeps until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "sprint expiration monitor started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let report = self.run_cycle().await;
            if !report.is_idle() {
                info!(
                    expired = report.expired.len(),
                    failed = report.failed.len(),
                    query_failed = report.query_failed,
                    "expiration sweep finished"
                );
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("sprint expiration monitor stopped");
    }

    /// Spawns [`Self::run`] onto the current runtime.
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
