//! Service layer for business logic and orchestration.
//!
//! Services sit between the repository and the HTTP layer: pure stats
//! aggregation, the prediction engine with its cache policy, and the
//! background sync processor with job tracking.

pub mod job_tracker;

pub mod predict;

pub mod stats;

pub mod sync;

pub use predict::PredictionEngine;
pub use sync::SyncService;


#[cfg(test)]
#[path = "predict_tests.rs"]
mod predict_tests;
