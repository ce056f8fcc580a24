//! Provider adapter layer.
//!
//! A provider adapter owns everything provider-specific: wire protocol,
//! session/credential lifecycle, and the mandatory three-valued error
//! classification. The rest of the pipeline sees only the
//! [`adapter::ProviderAdapter`] trait and typed, media-tagged results.

pub mod adapter;
pub mod mirage;
pub mod registry;
pub mod session;

pub use adapter::{
    ErrorClass, PollOutcome, ProviderAdapter, ProviderError, ProviderResult, SubmittedJob,
};
pub use registry::ProviderRegistry;
