//! Runtime configuration.
//!
//! Settings come from environment variables:
//!
//! - `DATABASE_URL`: required by the monitor binary.
//! - `SPRINTLINE_POOL_SIZE`: connection pool size, defaults to `4`.
//! - `SPRINTLINE_MIN_LAUNCH_TASKS`: tasks a sprint needs to launch,
//!   defaults to `6`.
//! - `SPRINTLINE_EXPIRATION_INTERVAL_SECS`: seconds between expiration
//!   sweeps, defaults to `60`.
//! - `RUST_LOG`: tracing filter, defaults to `sprintline=info`.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DATABASE_URL: &str = "DATABASE_URL";
const POOL_SIZE: &str = "SPRINTLINE_POOL_SIZE";
const MIN_LAUNCH_TASKS: &str = "SPRINTLINE_MIN_LAUNCH_TASKS";
const EXPIRATION_INTERVAL_SECS: &str = "SPRINTLINE_EXPIRATION_INTERVAL_SECS";
const LOG_FILTER: &str = "RUST_LOG";

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// A variable could not be parsed or is out of range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Scheduling rules shared by the services and the expiration monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Smallest number of tasks a sprint may launch with.
    pub min_launch_tasks: usize,
    /// Pause between expiration sweeps.
    pub expiration_interval: Duration,
}

impl SchedulerConfig {
    /// Default launch minimum: a sprint needs more than five tasks.
    pub const DEFAULT_MIN_LAUNCH_TASKS: usize = 6;

    /// Default pause between expiration sweeps.
    pub const DEFAULT_EXPIRATION_INTERVAL: Duration = Duration::from_secs(60);

    /// Reads scheduler settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads scheduler settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable numbers, a zero
    /// launch minimum, or a zero interval.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let min_launch_tasks =
            parse_or(&lookup, MIN_LAUNCH_TASKS, Self::DEFAULT_MIN_LAUNCH_TASKS)?;
        if min_launch_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                name: MIN_LAUNCH_TASKS,
                reason: "must be at least 1".to_owned(),
            });
        }
        let interval_secs = parse_or(
            &lookup,
            EXPIRATION_INTERVAL_SECS,
            Self::DEFAULT_EXPIRATION_INTERVAL.as_secs(),
        )?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: EXPIRATION_INTERVAL_SECS,
                reason: "must be at least 1 second".to_owned(),
            });
        }
        Ok(Self {
            min_launch_tasks,
            expiration_interval: Duration::from_secs(interval_secs),
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_launch_tasks: Self::DEFAULT_MIN_LAUNCH_TASKS,
            expiration_interval: Self::DEFAULT_EXPIRATION_INTERVAL,
        }
    }
}

/// Settings for the `sprint-monitor` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Tracing filter directive.
    pub log_filter: String,
    /// Scheduling rules.
    pub scheduler: SchedulerConfig,
}

impl MonitorConfig {
    /// Default pool size.
    pub const DEFAULT_POOL_SIZE: u32 = 4;

    /// Default tracing filter.
    pub const DEFAULT_LOG_FILTER: &'static str = "sprintline=info";

    /// Reads monitor settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads monitor settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] without a database URL and
    /// [`ConfigError::InvalidValue`] for malformed numbers.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar(DATABASE_URL))?;
        let pool_size = parse_or(&lookup, POOL_SIZE, Self::DEFAULT_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: POOL_SIZE,
                reason: "must be at least 1".to_owned(),
            });
        }
        let log_filter =
            lookup(LOG_FILTER).unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_owned());
        let scheduler = SchedulerConfig::from_lookup(&lookup)?;

        Ok(Self {
            database_url,
            pool_size,
            log_filter,
            scheduler,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    raw.trim()
        .parse()
        .map_err(|err: T::Err| ConfigError::InvalidValue {
            name,
            reason: err.to_string(),
        })
}
