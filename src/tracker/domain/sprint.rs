//! Sprint aggregate root and lifecycle types.

use super::{ProjectId, Revision, SprintId, TrackerDomainError, task::normalized_name};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated sprint name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SprintName(String);

impl SprintName {
    /// Creates a validated sprint name.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::InvalidSprintName`] when the trimmed
    /// name is shorter than 3 or longer than 100 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, TrackerDomainError> {
        let raw = value.into();
        normalized_name(&raw)
            .map(Self)
            .ok_or(TrackerDomainError::InvalidSprintName(raw))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SprintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed sprint lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SprintDuration {
    /// One week.
    OneWeek,
    /// Two weeks.
    TwoWeeks,
    /// Three weeks.
    ThreeWeeks,
    /// Four weeks.
    FourWeeks,
}

impl SprintDuration {
    /// Returns the length in weeks.
    #[must_use]
    pub const fn weeks(self) -> u8 {
        match self {
            Self::OneWeek => 1,
            Self::TwoWeeks => 2,
            Self::ThreeWeeks => 3,
            Self::FourWeeks => 4,
        }
    }

    /// Returns the length as a time span.
    #[must_use]
    pub fn as_time_delta(self) -> TimeDelta {
        TimeDelta::weeks(i64::from(self.weeks()))
    }
}

impl TryFrom<u8> for SprintDuration {
    type Error = TrackerDomainError;

    fn try_from(weeks: u8) -> Result<Self, Self::Error> {
        match weeks {
            1 => Ok(Self::OneWeek),
            2 => Ok(Self::TwoWeeks),
            3 => Ok(Self::ThreeWeeks),
            4 => Ok(Self::FourWeeks),
            other => Err(TrackerDomainError::InvalidSprintDuration(other)),
        }
    }
}

impl From<SprintDuration> for u8 {
    fn from(duration: SprintDuration) -> Self {
        duration.weeks()
    }
}

/// Sprint lifecycle state derived from the activity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintState {
    /// Created, not yet launched.
    Draft,
    /// Launched and running.
    Active,
    /// Closed out; terminal.
    Completed,
}

impl SprintState {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SprintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sprint aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    id: SprintId,
    project_id: ProjectId,
    name: SprintName,
    duration: SprintDuration,
    created_at: DateTime<Utc>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    is_active: bool,
    is_completed: bool,
    revision: Revision,
}

/// Parameter object for reconstructing a persisted sprint aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSprintData {
    /// Persisted sprint identifier.
    pub id: SprintId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Persisted name.
    pub name: SprintName,
    /// Persisted duration.
    pub duration: SprintDuration,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Launch timestamp.
    pub start_date: Option<DateTime<Utc>>,
    /// Scheduled end timestamp.
    pub end_date: Option<DateTime<Utc>>,
    /// Whether the sprint is running.
    pub is_active: bool,
    /// Whether the sprint has been closed out.
    pub is_completed: bool,
    /// Stored revision.
    pub revision: Revision,
}

impl Sprint {
    /// Creates a draft sprint.
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        name: SprintName,
        duration: SprintDuration,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: SprintId::new(),
            project_id,
            name,
            duration,
            created_at: clock.utc(),
            start_date: None,
            end_date: None,
            is_active: false,
            is_completed: false,
            revision: Revision::INITIAL,
        }
    }

    /// Reconstructs a sprint from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedSprintData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            name: data.name,
            duration: data.duration,
            created_at: data.created_at,
            start_date: data.start_date,
            end_date: data.end_date,
            is_active: data.is_active,
            is_completed: data.is_completed,
            revision: data.revision,
        }
    }

    /// Returns the sprint identifier.
    #[must_use]
    pub const fn id(&self) -> SprintId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the sprint name.
    #[must_use]
    pub const fn name(&self) -> &SprintName {
        &self.name
    }

    /// Returns the configured duration.
    #[must_use]
    pub const fn duration(&self) -> SprintDuration {
        self.duration
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the launch timestamp, if launched.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Returns the scheduled end timestamp, if launched.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Returns whether the sprint is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the sprint has been closed out.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Returns the stored revision this copy was read at.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SprintState {
        if self.is_completed {
            SprintState::Completed
        } else if self.is_active {
            SprintState::Active
        } else {
            SprintState::Draft
        }
    }

    /// Returns whether an active sprint has reached its end date at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date.is_some_and(|end| end <= now)
    }

    /// Launches a draft sprint, fixing its start and end dates.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::InvalidSprintTransition`] unless the
    /// sprint is a draft.
    pub fn launch(&mut self, clock: &impl Clock) -> Result<(), TrackerDomainError> {
        self.ensure_state(SprintState::Draft, SprintState::Active)?;
        let now = clock.utc();
        self.start_date = Some(now);
        self.end_date = Some(now + self.duration.as_time_delta());
        self.is_active = true;
        Ok(())
    }

    /// Closes out an active sprint.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::InvalidSprintTransition`] unless the
    /// sprint is active.
    pub fn complete(&mut self) -> Result<(), TrackerDomainError> {
        self.ensure_state(SprintState::Active, SprintState::Completed)?;
        self.is_active = false;
        self.is_completed = true;
        Ok(())
    }

    /// Advances the revision after a change has been queued for commit.
    pub(crate) const fn advance_revision(&mut self) {
        self.revision = self.revision.next();
    }

    fn ensure_state(
        &self,
        required: SprintState,
        target: SprintState,
    ) -> Result<(), TrackerDomainError> {
        let current = self.state();
        if current == required {
            Ok(())
        } else {
            Err(TrackerDomainError::InvalidSprintTransition {
                sprint_id: self.id,
                from: current,
                to: target,
            })
        }
    }
}
