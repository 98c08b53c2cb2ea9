//! Permission grant domain entities.

pub mod kind;
pub mod model;

pub use kind::{PermissionType, ResourceType};
pub use model::{CreatePermission, Permission, UpdatePermission};
