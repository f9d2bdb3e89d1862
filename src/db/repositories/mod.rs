//! Repository implementations module.
//!
//! Currently a single backend: the in-memory `LocalRepository` with an
//! optional append-only journal for durability.

#[cfg(feature = "local-repo")]
pub mod local;

#[cfg(feature = "local-repo")]
pub use local::LocalRepository;
