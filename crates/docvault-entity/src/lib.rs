//! # docvault-entity
//!
//! Domain entity models for DocVault. Row structs derive `sqlx::FromRow`;
//! closed enums are stored as lowercase `TEXT` columns.

pub mod document;
pub mod folder;
pub mod permission;
