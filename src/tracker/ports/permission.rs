//! Permission gate port.
//!
//! The gate answers a single question: may a user manage a project? The
//! tracker consumes the answer and never decides it.

use crate::tracker::domain::{ProjectId, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for permission gate lookups.
pub type PermissionGateResult<T> = Result<T, PermissionGateError>;

/// Project-level authorization contract.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Returns `true` when `user_id` owns `project_id` or manages it.
    ///
    /// Unknown users and projects yield `false`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionGateError::Lookup`] when the answer could not be
    /// determined.
    async fn has_project_permission(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> PermissionGateResult<bool>;
}

/// Errors returned by permission gate implementations.
#[derive(Debug, Clone, Error)]
pub enum PermissionGateError {
    /// The backing lookup failed.
    #[error("permission lookup failed: {0}")]
    Lookup(Arc<dyn std::error::Error + Send + Sync>),
}

impl PermissionGateError {
    /// Wraps a lookup error.
    pub fn lookup(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Lookup(Arc::new(err))
    }
}
