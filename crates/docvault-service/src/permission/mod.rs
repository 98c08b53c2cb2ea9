//! Permission grants and effective-permission resolution.

pub mod resolver;
pub mod service;

pub use resolver::{GrantSource, PermissionDecision, PermissionResolver};
pub use service::{CreatePermissionRequest, PermissionService};
