//! Task dependency and sprint lifecycle engine.
//!
//! Tasks move through a fixed status machine, may depend on one other task
//! (finish-to-start or start-to-start), and are scheduled into sprints that
//! go from draft to active to completed. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
