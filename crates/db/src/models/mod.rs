//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts
//! - Query/update DTOs where the repository needs them

pub mod asset;
pub mod generation;
pub mod provider_account;
pub mod status;
pub mod submission;
