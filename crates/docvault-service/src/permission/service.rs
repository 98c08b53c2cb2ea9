//! Permission grant management, checks, and propagation.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use docvault_core::error::AppError;
use docvault_core::types::{FolderId, PageRequest, PageResponse, PermissionId, RoleId};
use docvault_database::repositories::permission::PermissionRepository;
use docvault_entity::permission::{
    CreatePermission, Permission, PermissionType, ResourceType, UpdatePermission,
};

use crate::context::RequestContext;

use super::resolver::{PermissionDecision, PermissionResolver};

/// Manages permission grants on folders and documents.
#[derive(Debug, Clone)]
pub struct PermissionService {
    /// Permission repository.
    permission_repo: Arc<PermissionRepository>,
    /// Effective permission resolver.
    resolver: Arc<PermissionResolver>,
}

/// Request to create a direct grant.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreatePermissionRequest {
    /// Role receiving the grant.
    pub role_id: RoleId,
    /// Resource type.
    pub resource_type: ResourceType,
    /// Resource ID.
    pub resource_id: Uuid,
    /// Permission to grant.
    pub permission_type: PermissionType,
}

impl CreatePermissionRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.role_id.is_nil() {
            return Err(AppError::validation("Role ID is required"));
        }
        if self.resource_id.is_nil() {
            return Err(AppError::validation("Resource ID is required"));
        }
        Ok(())
    }

    fn into_record(self, ctx: &RequestContext) -> CreatePermission {
        CreatePermission {
            role_id: self.role_id,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            permission_type: self.permission_type,
            created_by: ctx.user_id,
        }
    }
}

impl PermissionService {
    /// Creates a new permission service.
    pub fn new(
        permission_repo: Arc<PermissionRepository>,
        resolver: Arc<PermissionResolver>,
    ) -> Self {
        Self {
            permission_repo,
            resolver,
        }
    }

    /// Grants a permission to a role on a resource.
    pub async fn create_permission(
        &self,
        ctx: &RequestContext,
        req: CreatePermissionRequest,
    ) -> Result<Permission, AppError> {
        let scope = ctx.scope()?;
        req.validate()?;

        let permission = self
            .permission_repo
            .create(&scope, &req.into_record(ctx))
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            permission_id = %permission.id,
            role_id = %permission.role_id,
            resource = %permission.resource_type,
            resource_id = %permission.resource_id,
            permission = %permission.permission_type,
            "Permission granted"
        );

        Ok(permission)
    }

    /// Grants several permissions at once; all or nothing.
    pub async fn create_bulk(
        &self,
        ctx: &RequestContext,
        reqs: Vec<CreatePermissionRequest>,
    ) -> Result<Vec<Permission>, AppError> {
        let scope = ctx.scope()?;
        if reqs.is_empty() {
            return Err(AppError::validation("At least one permission is required"));
        }
        for req in &reqs {
            req.validate()?;
        }

        let records: Vec<CreatePermission> =
            reqs.into_iter().map(|r| r.into_record(ctx)).collect();
        let created = self.permission_repo.create_bulk(&scope, &records).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            count = created.len(),
            "Permissions granted in bulk"
        );

        Ok(created)
    }

    /// Gets a grant by ID.
    pub async fn get_permission(
        &self,
        ctx: &RequestContext,
        permission_id: PermissionId,
    ) -> Result<Permission, AppError> {
        self.permission_repo
            .find_by_id(&ctx.scope()?, permission_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Permission {permission_id} not found")))
    }

    /// Changes a direct grant. Copies propagated from it are removed.
    pub async fn update_permission(
        &self,
        ctx: &RequestContext,
        permission_id: PermissionId,
        changes: UpdatePermission,
    ) -> Result<Permission, AppError> {
        let scope = ctx.scope()?;
        if changes.is_empty() {
            return Err(AppError::validation("No changes supplied"));
        }
        if changes.role_id.is_some_and(|r| r.is_nil()) {
            return Err(AppError::validation("Role ID is required"));
        }

        let permission = self
            .permission_repo
            .update(&scope, permission_id, &changes)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            permission_id = %permission_id,
            role_id = %permission.role_id,
            permission = %permission.permission_type,
            "Permission updated"
        );

        Ok(permission)
    }

    /// Revokes a grant together with its propagated copies.
    pub async fn delete_permission(
        &self,
        ctx: &RequestContext,
        permission_id: PermissionId,
    ) -> Result<(), AppError> {
        let scope = ctx.scope()?;
        let permission = self.permission_repo.delete(&scope, permission_id).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            permission_id = %permission_id,
            role_id = %permission.role_id,
            resource_id = %permission.resource_id,
            "Permission revoked"
        );

        Ok(())
    }

    /// All grants on a resource. The resource must exist in the tenant.
    pub async fn list_for_resource(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<Permission>, AppError> {
        self.permission_repo
            .find_by_resource(&ctx.scope()?, resource_type, resource_id)
            .await
    }

    /// All grants held by a role.
    pub async fn list_for_role(
        &self,
        ctx: &RequestContext,
        role_id: RoleId,
    ) -> Result<Vec<Permission>, AppError> {
        self.permission_repo.find_by_role(&ctx.scope()?, role_id).await
    }

    /// Every grant in the caller's tenant.
    pub async fn list_for_tenant(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<PageResponse<Permission>, AppError> {
        self.permission_repo.find_by_tenant(&ctx.scope()?, &page).await
    }

    /// Revokes every grant on a resource.
    pub async fn delete_by_resource(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<u64, AppError> {
        let scope = ctx.scope()?;
        let deleted = self
            .permission_repo
            .delete_by_resource(&scope, resource_type, resource_id)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            resource = %resource_type,
            resource_id = %resource_id,
            deleted,
            "Resource permissions revoked"
        );

        Ok(deleted)
    }

    /// Revokes every grant held by a role.
    pub async fn delete_by_role(
        &self,
        ctx: &RequestContext,
        role_id: RoleId,
    ) -> Result<u64, AppError> {
        let scope = ctx.scope()?;
        let deleted = self.permission_repo.delete_by_role(&scope, role_id).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            role_id = %role_id,
            deleted,
            "Role permissions revoked"
        );

        Ok(deleted)
    }

    /// Whether `role_id` holds `permission_type` on a resource, directly,
    /// through `admin`, or from an ancestor folder.
    pub async fn check_permission(
        &self,
        ctx: &RequestContext,
        role_id: RoleId,
        resource_type: ResourceType,
        resource_id: Uuid,
        permission_type: PermissionType,
    ) -> Result<bool, AppError> {
        let decision = self
            .resolver
            .resolve(&ctx.scope()?, role_id, resource_type, resource_id, permission_type)
            .await?;
        Ok(decision.granted)
    }

    /// Grants reaching a folder from its ancestors, tagged as inherited.
    pub async fn get_inherited_permissions(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<Vec<Permission>, AppError> {
        self.resolver
            .inherited_permissions(&ctx.scope()?, folder_id)
            .await
    }

    /// Copies a folder's direct grants onto its whole subtree.
    pub async fn propagate_permissions(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<Vec<Permission>, AppError> {
        let scope = ctx.scope()?;
        let created = self.permission_repo.propagate(&scope, folder_id).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            folder_id = %folder_id,
            created = created.len(),
            "Permissions propagated"
        );

        Ok(created)
    }

    /// Requires that at least one of the caller's roles holds
    /// `permission_type` on the resource.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
        permission_type: PermissionType,
    ) -> Result<PermissionDecision, AppError> {
        let scope = ctx.scope()?;
        for role_id in &ctx.roles {
            let decision = self
                .resolver
                .resolve(&scope, *role_id, resource_type, resource_id, permission_type)
                .await?;
            if decision.granted {
                return Ok(decision);
            }
        }

        warn!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            resource = %resource_type,
            resource_id = %resource_id,
            required = %permission_type,
            "Permission denied"
        );

        Err(AppError::authorization(format!(
            "Missing '{permission_type}' permission on {resource_type} {resource_id}"
        )))
    }
}
