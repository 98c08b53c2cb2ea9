//! Effective permission resolver.
//!
//! Resolution order for a role on a resource:
//! 1. Direct grant of the required type.
//! 2. Direct `admin` grant on the same resource.
//! 3. Folders only: the nearest ancestor folder holding a direct grant that
//!    satisfies the requirement.
//!
//! Only direct grants take part. Propagated copies are never consulted, so
//! a stale copy cannot widen access.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use docvault_core::TenantScope;
use docvault_core::error::AppError;
use docvault_core::types::{FolderId, RoleId};
use docvault_database::repositories::folder::FolderRepository;
use docvault_database::repositories::permission::PermissionRepository;
use docvault_entity::folder::path;
use docvault_entity::permission::{Permission, PermissionType, ResourceType};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    /// Whether access is granted.
    pub granted: bool,
    /// Where the grant came from.
    pub source: GrantSource,
}

/// Where a decision was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    /// A direct grant of the required type.
    Direct,
    /// A direct `admin` grant on the resource.
    Admin,
    /// A grant on an ancestor folder.
    Ancestor {
        /// The ancestor holding the grant.
        folder_id: FolderId,
    },
    /// No applicable grant.
    Denied,
}

impl PermissionDecision {
    fn granted(source: GrantSource) -> Self {
        Self {
            granted: true,
            source,
        }
    }

    fn denied() -> Self {
        Self {
            granted: false,
            source: GrantSource::Denied,
        }
    }
}

/// Resolves effective permissions from direct grants and the folder tree.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    /// Folder repository, for ancestor lookups.
    folder_repo: Arc<FolderRepository>,
    /// Permission repository.
    permission_repo: Arc<PermissionRepository>,
}

impl PermissionResolver {
    /// Creates a new resolver.
    pub fn new(
        folder_repo: Arc<FolderRepository>,
        permission_repo: Arc<PermissionRepository>,
    ) -> Self {
        Self {
            folder_repo,
            permission_repo,
        }
    }

    /// Resolves whether `role_id` holds `required` on a resource.
    pub async fn resolve(
        &self,
        scope: &TenantScope,
        role_id: RoleId,
        resource_type: ResourceType,
        resource_id: Uuid,
        required: PermissionType,
    ) -> Result<PermissionDecision, AppError> {
        let held = self
            .permission_repo
            .find_direct_types(scope, role_id, resource_type, resource_id)
            .await?;

        if held.contains(&required) {
            return Ok(PermissionDecision::granted(GrantSource::Direct));
        }
        if held.contains(&PermissionType::Admin) {
            return Ok(PermissionDecision::granted(GrantSource::Admin));
        }
        if resource_type != ResourceType::Folder {
            return Ok(PermissionDecision::denied());
        }

        let folder_id = FolderId::from_uuid(resource_id);
        let Some(folder) = self.folder_repo.find_by_id(scope, folder_id).await? else {
            return Ok(PermissionDecision::denied());
        };

        let grants = self.ancestor_grants(scope, &folder.path, Some(role_id)).await?;
        let decision = grants
            .iter()
            .find(|(_, grant)| grant.grants(required))
            .map(|(ancestor_id, _)| {
                PermissionDecision::granted(GrantSource::Ancestor {
                    folder_id: *ancestor_id,
                })
            })
            .unwrap_or_else(PermissionDecision::denied);

        debug!(
            role_id = %role_id,
            folder_id = %folder_id,
            required = %required,
            granted = decision.granted,
            "Resolved folder permission through ancestors"
        );

        Ok(decision)
    }

    /// Direct grants on every ancestor of `folder_id`, tagged as inherited.
    /// Nearest ancestors come first.
    pub async fn inherited_permissions(
        &self,
        scope: &TenantScope,
        folder_id: FolderId,
    ) -> Result<Vec<Permission>, AppError> {
        let folder = self.folder_repo.get(scope, folder_id).await?;
        Ok(self
            .ancestor_grants(scope, &folder.path, None)
            .await?
            .into_iter()
            .map(|(_, grant)| grant.into_inherited())
            .collect())
    }

    /// Walks the ancestors of `folder_path` by stripping trailing segments,
    /// resolves them to folders, and returns their direct grants paired with
    /// the ancestor id, nearest ancestor first.
    async fn ancestor_grants(
        &self,
        scope: &TenantScope,
        folder_path: &str,
        role_id: Option<RoleId>,
    ) -> Result<Vec<(FolderId, Permission)>, AppError> {
        let ancestor_paths = path::ancestor_paths(folder_path);
        if ancestor_paths.is_empty() {
            return Ok(Vec::new());
        }

        let ancestors = self.folder_repo.find_by_paths(scope, &ancestor_paths).await?;
        let ancestor_ids: Vec<FolderId> = ancestors.iter().map(|f| f.id).collect();

        let grants = self
            .permission_repo
            .find_direct_on_folders(scope, &ancestor_ids, role_id)
            .await?;

        let mut resolved = Vec::with_capacity(grants.len());
        for ancestor in &ancestors {
            for grant in &grants {
                if grant.resource_id == ancestor.id.into_uuid() {
                    resolved.push((ancestor.id, grant.clone()));
                }
            }
        }
        Ok(resolved)
    }
}
