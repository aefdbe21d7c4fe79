//! Completes sprints whose end date has passed.
//!
//! Usage:
//!
//! ```text
//! DATABASE_URL=postgres://... sprint-monitor
//! ```
//!
//! Settings are read from the environment as described in
//! [`sprintline::config`]. The monitor sweeps until it receives Ctrl-C,
//! then finishes the sweep in flight and exits.

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use sprintline::config::MonitorConfig;
use sprintline::telemetry::init_tracing;
use sprintline::tracker::{
    adapters::{RepositoryPermissionGate, postgres::PostgresTrackerRepository},
    services::{SprintExpirationMonitor, SprintSchedulerService},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let config = MonitorConfig::from_env()?;
    init_tracing(&config.log_filter)?;

    let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
    let pool = Pool::builder().max_size(config.pool_size).build(manager)?;
    info!(pool_size = config.pool_size, "database pool ready");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(pool, &config))
}

async fn run(
    pool: Pool<ConnectionManager<PgConnection>>,
    config: &MonitorConfig,
) -> Result<(), BoxError> {
    let repository = Arc::new(PostgresTrackerRepository::new(pool));
    let permissions = Arc::new(RepositoryPermissionGate::new(Arc::clone(&repository)));
    let scheduler = SprintSchedulerService::new(repository, permissions, Arc::new(DefaultClock))
        .with_config(&config.scheduler);
    let monitor = SprintExpirationMonitor::new(scheduler, config.scheduler.expiration_interval);

    let shutdown = CancellationToken::new();
    let handle = monitor.spawn(shutdown.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.cancel();
    handle.await?;
    Ok(())
}
