//! Adapter implementations for tracker ports.

pub mod memory;
pub mod postgres;

mod permission;

pub use permission::RepositoryPermissionGate;
