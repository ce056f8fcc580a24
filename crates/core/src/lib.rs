//! Pure domain logic for the generation pipeline.
//!
//! This crate has no internal dependencies and touches neither the
//! database nor the network. Everything here is deterministic and
//! unit-testable: operation resolution, parameter canonicalization,
//! reproducible hashing, and social context clamping.

pub mod canonical;
pub mod error;
pub mod hashing;
pub mod operation;
pub mod social;
pub mod types;

pub use error::CoreError;
