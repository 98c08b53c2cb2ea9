//! # docvault-core
//!
//! Core crate for DocVault. Contains the unified error system, typed
//! identifiers, the tenant scope capability, pagination types, and the
//! configuration schemas.
//!
//! This crate has **no** internal dependencies on other DocVault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use types::tenant::TenantScope;
