//! `PostgreSQL` adapters for tracker persistence.
//!
//! The schema lives in `migrations/`; apply it before pointing a pool at
//! the database.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTrackerRepository, TrackerPgPool};
