//! Permission grant entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use docvault_core::types::{PermissionId, RoleId, TenantId, UserId};

use super::kind::{PermissionType, ResourceType};

/// A permission granted to a role on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    /// Unique grant identifier.
    pub id: PermissionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Role holding the grant.
    pub role_id: RoleId,
    /// Type of resource this grant applies to.
    pub resource_type: ResourceType,
    /// ID of the resource (a folder or document ID).
    pub resource_id: Uuid,
    /// The granted permission.
    pub permission_type: PermissionType,
    /// `false` for grants created directly; `true` for copies made by
    /// propagation and for values resolved from an ancestor folder.
    pub inherited: bool,
    /// For propagated copies, the direct grant they were cloned from.
    pub source_permission_id: Option<PermissionId>,
    /// Who created the grant.
    pub created_by: UserId,
    /// When this grant was created.
    pub created_at: DateTime<Utc>,
    /// When this grant was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Whether this grant satisfies `required` on its own resource.
    pub fn grants(&self, required: PermissionType) -> bool {
        self.permission_type.satisfies(required)
    }

    /// Whether this row was created directly rather than propagated.
    pub fn is_direct(&self) -> bool {
        !self.inherited
    }

    /// Mark a resolved value as inherited without touching storage.
    pub fn into_inherited(mut self) -> Self {
        self.inherited = true;
        self
    }
}

/// Data required to create a direct grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    /// Role receiving the grant.
    pub role_id: RoleId,
    /// Resource type.
    pub resource_type: ResourceType,
    /// Resource ID.
    pub resource_id: Uuid,
    /// Permission to grant.
    pub permission_type: PermissionType,
    /// Who is creating the grant.
    pub created_by: UserId,
}

/// Changes applied to an existing grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePermission {
    /// New role.
    pub role_id: Option<RoleId>,
    /// New permission type.
    pub permission_type: Option<PermissionType>,
}

impl UpdatePermission {
    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self.role_id.is_none() && self.permission_type.is_none()
    }
}
