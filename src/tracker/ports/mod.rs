//! Port contracts for the tracker.
//!
//! Ports define infrastructure-agnostic interfaces used by tracker services.

pub mod permission;
pub mod repository;

pub use permission::{PermissionGate, PermissionGateError, PermissionGateResult};
pub use repository::{
    ChangeSet, Deletion, Revised, TrackerRepository, TrackerRepositoryError,
    TrackerRepositoryResult,
};
