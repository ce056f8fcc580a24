//! The generation pipeline: intake, dispatch, polling, and result
//! materialization.
//!
//! All retry and lifecycle decisions live in pure functions
//! ([`orchestrator`], [`materializer`]); the background workers
//! ([`submit_worker`], [`poller`]) apply those decisions against the
//! database and provider adapters.

pub mod backoff;
pub mod bootstrap;
pub mod error;
pub mod intake;
pub mod materializer;
pub mod orchestrator;
pub mod poller;
pub mod submit_worker;

pub use error::PipelineError;
pub use intake::{IntakeOutcome, IntakeRequest};
pub use poller::Poller;
pub use submit_worker::SubmitWorker;
