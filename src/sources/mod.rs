//! Record sources implementing [`crate::search::orchestrator::RecordSearch`].
//!
//! Real deployments plug their own transport in behind the trait; the
//! in-memory source here backs the replay CLI and tests.

pub mod memory;

pub use memory::MemorySource;
