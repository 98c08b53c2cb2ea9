//! # docvault-service
//!
//! Service layer for DocVault. Each service wraps the tenant-scoped
//! repositories, validates input, derives the [`TenantScope`] from the
//! caller's [`RequestContext`], and logs every mutation.
//!
//! Services take their dependencies at construction time as `Arc`s.
//!
//! [`TenantScope`]: docvault_core::TenantScope

pub mod context;
pub mod document;
pub mod folder;
pub mod permission;

pub use context::RequestContext;
pub use document::DocumentService;
pub use folder::FolderService;
pub use permission::{GrantSource, PermissionDecision, PermissionResolver, PermissionService};
