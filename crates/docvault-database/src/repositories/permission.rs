//! Permission store: grant CRUD, bulk maintenance, and subtree propagation.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use docvault_core::TenantScope;
use docvault_core::error::{AppError, ErrorKind};
use docvault_core::result::AppResult;
use docvault_core::types::{FolderId, PageRequest, PageResponse, PermissionId, RoleId};
use docvault_entity::permission::{
    CreatePermission, Permission, PermissionType, ResourceType, UpdatePermission,
};

use super::folder::{fetch_descendants, fetch_folder};
use super::{begin, commit, write_error};

/// Repository for permission grants.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    /// Create a new permission repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a grant by ID.
    pub async fn find_by_id(
        &self,
        scope: &TenantScope,
        id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find permission", e))
    }

    /// All grants (direct and propagated) on a resource. The resource must
    /// exist in the tenant.
    pub async fn find_by_resource(
        &self,
        scope: &TenantScope,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<Vec<Permission>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })?;
        if !resource_exists(&mut conn, scope, resource_type, resource_id).await? {
            return Err(AppError::not_found(format!("{resource_type} {resource_id} not found")));
        }

        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3 \
             ORDER BY inherited ASC, created_at ASC",
        )
        .bind(scope.tenant_id())
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list permissions for resource", e)
        })
    }

    /// All grants held by a role.
    pub async fn find_by_role(
        &self,
        scope: &TenantScope,
        role_id: RoleId,
    ) -> AppResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE tenant_id = $1 AND role_id = $2 \
             ORDER BY inherited ASC, created_at ASC",
        )
        .bind(scope.tenant_id())
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list permissions for role", e)
        })
    }

    /// Every grant in the tenant, paginated.
    pub async fn find_by_tenant(
        &self,
        scope: &TenantScope,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Permission>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE tenant_id = $1")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count permissions", e)
            })?;

        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE tenant_id = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(scope.tenant_id())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list permissions", e))?;

        Ok(PageResponse::new(permissions, page, total as u64))
    }

    /// Permission types a role holds directly on a resource. Propagated
    /// copies are excluded.
    pub async fn find_direct_types(
        &self,
        scope: &TenantScope,
        role_id: RoleId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<Vec<PermissionType>> {
        sqlx::query_scalar::<_, PermissionType>(
            "SELECT permission_type FROM permissions \
             WHERE tenant_id = $1 AND role_id = $2 AND resource_type = $3 AND resource_id = $4 \
             AND inherited = $5",
        )
        .bind(scope.tenant_id())
        .bind(role_id)
        .bind(resource_type)
        .bind(resource_id)
        .bind(false)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check permission", e))
    }

    /// Direct grants on any of `folder_ids`, optionally restricted to one role.
    pub async fn find_direct_on_folders(
        &self,
        scope: &TenantScope,
        folder_ids: &[FolderId],
        role_id: Option<RoleId>,
    ) -> AppResult<Vec<Permission>> {
        if folder_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM permissions WHERE tenant_id = ");
        query.push_bind(scope.tenant_id());
        query.push(" AND resource_type = ");
        query.push_bind(ResourceType::Folder);
        query.push(" AND inherited = ");
        query.push_bind(false);
        if let Some(role_id) = role_id {
            query.push(" AND role_id = ");
            query.push_bind(role_id);
        }
        query.push(" AND resource_id IN (");
        let mut separated = query.separated(", ");
        for id in folder_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY created_at ASC");

        query
            .build_query_as::<Permission>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to load ancestor grants", e)
            })
    }

    /// Create a direct grant. The resource must exist in the tenant.
    pub async fn create(
        &self,
        scope: &TenantScope,
        data: &CreatePermission,
    ) -> AppResult<Permission> {
        let mut tx = begin(&self.pool).await?;
        let permission = insert_direct(&mut tx, scope, data).await?;
        commit(tx, "create permission").await?;
        Ok(permission)
    }

    /// Create several direct grants; either all are stored or none.
    pub async fn create_bulk(
        &self,
        scope: &TenantScope,
        data: &[CreatePermission],
    ) -> AppResult<Vec<Permission>> {
        let mut tx = begin(&self.pool).await?;
        let mut created = Vec::with_capacity(data.len());
        for item in data {
            created.push(insert_direct(&mut tx, scope, item).await?);
        }
        commit(tx, "create permissions").await?;
        Ok(created)
    }

    /// Change a direct grant. Its propagated copies are invalidated.
    pub async fn update(
        &self,
        scope: &TenantScope,
        id: PermissionId,
        changes: &UpdatePermission,
    ) -> AppResult<Permission> {
        let mut tx = begin(&self.pool).await?;

        let current = fetch_permission(&mut tx, scope, id)
            .await?
            .ok_or_else(|| permission_not_found(id))?;
        if current.inherited {
            return Err(AppError::validation(
                "Propagated grants cannot be edited; update the source grant instead",
            ));
        }

        let invalidated = delete_copies_of(&mut tx, scope, id).await?;

        let role_id = changes.role_id.unwrap_or(current.role_id);
        let permission_type = changes.permission_type.unwrap_or(current.permission_type);
        let updated = sqlx::query_as::<_, Permission>(
            "UPDATE permissions SET role_id = $1, permission_type = $2, updated_at = $3 \
             WHERE id = $4 AND tenant_id = $5 RETURNING *",
        )
        .bind(role_id)
        .bind(permission_type)
        .bind(Utc::now())
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, "Failed to update permission", || {
                format!("Role {role_id} already holds '{permission_type}' on this resource")
            })
        })?;

        commit(tx, "update permission").await?;
        debug!(permission_id = %id, invalidated, "Propagated copies invalidated by update");
        Ok(updated)
    }

    /// Delete a grant and every copy propagated from it.
    pub async fn delete(&self, scope: &TenantScope, id: PermissionId) -> AppResult<Permission> {
        let mut tx = begin(&self.pool).await?;

        let permission = fetch_permission(&mut tx, scope, id)
            .await?
            .ok_or_else(|| permission_not_found(id))?;

        delete_copies_of(&mut tx, scope, id).await?;
        sqlx::query("DELETE FROM permissions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(scope.tenant_id())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete permission", e)
            })?;

        commit(tx, "delete permission").await?;
        Ok(permission)
    }

    /// Delete every grant on a resource, plus copies propagated from them.
    pub async fn delete_by_resource(
        &self,
        scope: &TenantScope,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<u64> {
        let mut tx = begin(&self.pool).await?;

        let copies = sqlx::query(
            "DELETE FROM permissions WHERE tenant_id = $1 AND source_permission_id IN ( \
                 SELECT id FROM permissions \
                 WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3)",
        )
        .bind(scope.tenant_id())
        .bind(resource_type)
        .bind(resource_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete propagated grants", e)
        })?
        .rows_affected();

        let direct = sqlx::query(
            "DELETE FROM permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3",
        )
        .bind(scope.tenant_id())
        .bind(resource_type)
        .bind(resource_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete resource grants", e)
        })?
        .rows_affected();

        commit(tx, "delete permissions by resource").await?;
        Ok(copies + direct)
    }

    /// Delete every grant held by a role.
    pub async fn delete_by_role(&self, scope: &TenantScope, role_id: RoleId) -> AppResult<u64> {
        let mut tx = begin(&self.pool).await?;

        let deleted = sqlx::query("DELETE FROM permissions WHERE tenant_id = $1 AND role_id = $2")
            .bind(scope.tenant_id())
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete role grants", e)
            })?
            .rows_affected();

        commit(tx, "delete permissions by role").await?;
        Ok(deleted)
    }

    /// Clone the folder's direct grants onto every descendant folder as
    /// `inherited` copies. Pairs that already hold the same role and type
    /// are skipped, so re-running creates nothing new.
    pub async fn propagate(
        &self,
        scope: &TenantScope,
        folder_id: FolderId,
    ) -> AppResult<Vec<Permission>> {
        let mut tx = begin(&self.pool).await?;

        let folder = fetch_folder(&mut tx, scope, folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;

        let sources = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE tenant_id = $1 AND resource_type = $2 \
             AND resource_id = $3 AND inherited = $4 ORDER BY created_at ASC",
        )
        .bind(scope.tenant_id())
        .bind(ResourceType::Folder)
        .bind(folder.id)
        .bind(false)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load folder grants", e)
        })?;

        let descendants = fetch_descendants(&mut tx, scope, &folder.path).await?;

        let mut created = Vec::new();
        for descendant in &descendants {
            for source in &sources {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM permissions WHERE tenant_id = $1 AND role_id = $2 \
                     AND resource_type = $3 AND resource_id = $4 AND permission_type = $5)",
                )
                .bind(scope.tenant_id())
                .bind(source.role_id)
                .bind(ResourceType::Folder)
                .bind(descendant.id)
                .bind(source.permission_type)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to check existing grant", e)
                })?;
                if exists {
                    continue;
                }

                let now = Utc::now();
                let copy = sqlx::query_as::<_, Permission>(
                    "INSERT INTO permissions (id, tenant_id, role_id, resource_type, resource_id, \
                     permission_type, inherited, source_permission_id, created_by, \
                     created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) RETURNING *",
                )
                .bind(PermissionId::new())
                .bind(scope.tenant_id())
                .bind(source.role_id)
                .bind(ResourceType::Folder)
                .bind(descendant.id)
                .bind(source.permission_type)
                .bind(true)
                .bind(source.id)
                .bind(source.created_by)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Database,
                        "Failed to insert propagated grant",
                        e,
                    )
                })?;
                created.push(copy);
            }
        }

        commit(tx, "propagate permissions").await?;

        debug!(
            tenant_id = %scope.tenant_id(),
            folder_id = %folder_id,
            sources = sources.len(),
            descendants = descendants.len(),
            created = created.len(),
            "Permissions propagated"
        );
        Ok(created)
    }
}

fn permission_not_found(id: PermissionId) -> AppError {
    AppError::not_found(format!("Permission {id} not found"))
}

async fn fetch_permission(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: PermissionId,
) -> AppResult<Option<Permission>> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find permission", e))
}

/// Whether the target resource exists in the scope's tenant.
async fn resource_exists(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    resource_type: ResourceType,
    resource_id: Uuid,
) -> AppResult<bool> {
    let sql = match resource_type {
        ResourceType::Folder => {
            "SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1 AND tenant_id = $2)"
        }
        ResourceType::Document => {
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1 AND tenant_id = $2)"
        }
    };
    sqlx::query_scalar::<_, bool>(sql)
        .bind(resource_id)
        .bind(scope.tenant_id())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check resource", e))
}

async fn insert_direct(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    data: &CreatePermission,
) -> AppResult<Permission> {
    if !resource_exists(conn, scope, data.resource_type, data.resource_id).await? {
        return Err(AppError::not_found(format!(
            "{} {} not found",
            data.resource_type, data.resource_id
        )));
    }

    let now = Utc::now();
    sqlx::query_as::<_, Permission>(
        "INSERT INTO permissions (id, tenant_id, role_id, resource_type, resource_id, \
         permission_type, inherited, source_permission_id, created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9, $9) RETURNING *",
    )
    .bind(PermissionId::new())
    .bind(scope.tenant_id())
    .bind(data.role_id)
    .bind(data.resource_type)
    .bind(data.resource_id)
    .bind(data.permission_type)
    .bind(false)
    .bind(data.created_by)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        write_error(e, "Failed to create permission", || {
            format!(
                "Role {} already holds '{}' on {} {}",
                data.role_id, data.permission_type, data.resource_type, data.resource_id
            )
        })
    })
}

/// Remove the propagated copies of a direct grant.
async fn delete_copies_of(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    source_id: PermissionId,
) -> AppResult<u64> {
    sqlx::query("DELETE FROM permissions WHERE tenant_id = $1 AND source_permission_id = $2")
        .bind(scope.tenant_id())
        .bind(source_id)
        .execute(&mut *conn)
        .await
        .map(|r| r.rows_affected())
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete propagated grants", e)
        })
}
