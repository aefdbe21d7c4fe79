//! Sprintline: task dependency tracking and sprint scheduling.
//!
//! This crate enforces a task status machine, validates single-prerequisite
//! dependency graphs, releases waiting tasks when their prerequisites move,
//! and gates sprint launches on readiness. A background monitor completes
//! sprints once their end date passes.
//!
//! # Architecture
//!
//! Sprintline follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and authorization
//! - **Adapters**: In-memory and `PostgreSQL` implementations of ports
//!
//! # Modules
//!
//! - [`tracker`]: Tasks, dependencies, sprints, and their services
//! - [`config`]: Environment-driven settings
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod telemetry;
pub mod tracker;
