//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Status literals always go
//! through the enums in `models::status` — no magic numbers.

pub mod asset_repo;
pub mod generation_repo;
pub mod provider_account_repo;
pub mod submission_repo;

pub use asset_repo::AssetRepo;
pub use generation_repo::GenerationRepo;
pub use provider_account_repo::ProviderAccountRepo;
pub use submission_repo::SubmissionRepo;
