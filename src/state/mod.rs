//! State module for tracking indexing progress
//!
//! # Components
//!
//! - `SiteStatus`: persisted status of each configured site (INDEXING, INDEXED, FAILED)
//! - `RunPhase`: the orchestrator's in-memory run state (idle, running, stopping)

mod run_phase;
mod site_status;

// Re-export main types
pub use run_phase::RunPhase;
pub use site_status::SiteStatus;
