//! Projects, users, and roles.
//!
//! Project membership and user accounts are managed elsewhere; the tracker
//! only reads them to answer permission and reviewer questions, and writes
//! the project completion flag.

use super::{ParseRoleError, ProjectId, Revision, TrackerDomainError, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Organisational role carried by a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May manage projects they belong to.
    Manager,
    /// Implements tasks.
    Developer,
    /// Reviews submitted tasks.
    Tester,
}

impl Role {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Developer => "developer",
            Self::Tester => "tester",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = ParseRoleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Self::Manager),
            "developer" => Ok(Self::Developer),
            "tester" => Ok(Self::Tester),
            _ => Err(ParseRoleError(value.to_owned())),
        }
    }
}

/// User account as seen by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    role: Role,
}

impl User {
    /// Creates a user with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::EmptyUsername`] when the trimmed
    /// username is empty.
    pub fn new(username: impl Into<String>, role: Role) -> Result<Self, TrackerDomainError> {
        Self::with_id(UserId::new(), username, role)
    }

    /// Creates a user with a known identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::EmptyUsername`] when the trimmed
    /// username is empty.
    pub fn with_id(
        id: UserId,
        username: impl Into<String>,
        role: Role,
    ) -> Result<Self, TrackerDomainError> {
        let raw = username.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TrackerDomainError::EmptyUsername);
        }
        Ok(Self {
            id,
            username: trimmed.to_owned(),
            role,
        })
    }

    /// Returns the user identifier.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

/// Project aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    name: String,
    owner_id: UserId,
    members: BTreeSet<UserId>,
    complete: bool,
    created_at: DateTime<Utc>,
    revision: Revision,
}

/// Parameter object for reconstructing a persisted project aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProjectData {
    /// Persisted project identifier.
    pub id: ProjectId,
    /// Persisted name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Member users, excluding the owner unless stored explicitly.
    pub members: BTreeSet<UserId>,
    /// Completion flag.
    pub complete: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Stored revision.
    pub revision: Revision,
}

impl Project {
    /// Creates a project owned by `owner_id`, who is also its first member.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::EmptyProjectName`] when the trimmed name
    /// is empty.
    pub fn new(
        name: impl Into<String>,
        owner_id: UserId,
        clock: &impl Clock,
    ) -> Result<Self, TrackerDomainError> {
        let raw = name.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TrackerDomainError::EmptyProjectName);
        }
        Ok(Self {
            id: ProjectId::new(),
            name: trimmed.to_owned(),
            owner_id,
            members: BTreeSet::from([owner_id]),
            complete: false,
            created_at: clock.utc(),
            revision: Revision::INITIAL,
        })
    }

    /// Adds members to the project.
    #[must_use]
    pub fn with_members(mut self, members: impl IntoIterator<Item = UserId>) -> Self {
        self.members.extend(members);
        self
    }

    /// Reconstructs a project from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedProjectData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            owner_id: data.owner_id,
            members: data.members,
            complete: data.complete,
            created_at: data.created_at,
            revision: data.revision,
        }
    }

    /// Returns the project identifier.
    #[must_use]
    pub const fn id(&self) -> ProjectId {
        self.id
    }

    /// Returns the project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns the member set.
    #[must_use]
    pub const fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    /// Returns whether `user_id` owns or belongs to the project.
    #[must_use]
    pub fn has_participant(&self, user_id: UserId) -> bool {
        self.owner_id == user_id || self.members.contains(&user_id)
    }

    /// Returns whether the project has been marked complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the stored revision this copy was read at.
    #[must_use]
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Marks the project complete.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::ProjectAlreadyComplete`] when the flag is
    /// already set.
    pub fn mark_complete(&mut self) -> Result<(), TrackerDomainError> {
        if self.complete {
            return Err(TrackerDomainError::ProjectAlreadyComplete);
        }
        self.complete = true;
        Ok(())
    }

    /// Advances the revision after a change has been queued for commit.
    pub(crate) const fn advance_revision(&mut self) {
        self.revision = self.revision.next();
    }
}
