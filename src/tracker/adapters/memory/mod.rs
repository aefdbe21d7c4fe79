//! In-memory adapter implementations for testing.
//!
//! These adapters provide simple, thread-safe implementations suitable for
//! unit testing without database dependencies.

mod clock;
mod store;

pub use clock::ManualClock;
pub use store::InMemoryTrackerStore;
