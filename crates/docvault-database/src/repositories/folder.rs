//! Folder hierarchy store.
//!
//! Paths are materialized: ancestor and descendant sets are prefix tests on
//! `folders.path`. Rename and move rewrite the whole subtree inside the
//! same transaction as the folder itself.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use docvault_core::TenantScope;
use docvault_core::error::{AppError, ErrorKind};
use docvault_core::result::AppResult;
use docvault_core::types::{FolderId, PageRequest, PageResponse};
use docvault_entity::folder::path;
use docvault_entity::folder::{CreateFolder, Folder};
use docvault_entity::permission::ResourceType;

use super::{begin, commit, write_error};

/// Repository for folder CRUD and tree queries.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: SqlitePool,
}

impl FolderRepository {
    /// Create a new folder repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a folder by ID.
    pub async fn find_by_id(&self, scope: &TenantScope, id: FolderId) -> AppResult<Option<Folder>> {
        let mut conn = self.acquire().await?;
        fetch_folder(&mut conn, scope, id).await
    }

    /// Load a folder by ID, failing with not-found.
    pub async fn get(&self, scope: &TenantScope, id: FolderId) -> AppResult<Folder> {
        self.find_by_id(scope, id)
            .await?
            .ok_or_else(|| folder_not_found(id))
    }

    /// Find a folder by its full path.
    pub async fn find_by_path(&self, scope: &TenantScope, path: &str) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE tenant_id = $1 AND path = $2")
            .bind(scope.tenant_id())
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find folder by path", e)
            })
    }

    /// Resolve a set of paths to folders, deepest first. Unknown paths are skipped.
    pub async fn find_by_paths(
        &self,
        scope: &TenantScope,
        paths: &[String],
    ) -> AppResult<Vec<Folder>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM folders WHERE tenant_id = ");
        query.push_bind(scope.tenant_id());
        query.push(" AND path IN (");
        let mut separated = query.separated(", ");
        for p in paths {
            separated.push_bind(p.clone());
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY depth DESC");

        query
            .build_query_as::<Folder>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to resolve paths", e))
    }

    /// List root folders, ordered by name.
    pub async fn find_roots(
        &self,
        scope: &TenantScope,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Folder>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folders WHERE tenant_id = $1 AND parent_id IS NULL",
        )
        .bind(scope.tenant_id())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count root folders", e)
        })?;

        let folders = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE tenant_id = $1 AND parent_id IS NULL \
             ORDER BY name ASC LIMIT $2 OFFSET $3",
        )
        .bind(scope.tenant_id())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list root folders", e))?;

        Ok(PageResponse::new(folders, page, total as u64))
    }

    /// List direct children of a folder, ordered by name.
    pub async fn find_children(
        &self,
        scope: &TenantScope,
        parent_id: FolderId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Folder>> {
        if !self.exists(scope, parent_id).await? {
            return Err(folder_not_found(parent_id));
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folders WHERE tenant_id = $1 AND parent_id = $2",
        )
        .bind(scope.tenant_id())
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count children", e))?;

        let folders = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE tenant_id = $1 AND parent_id = $2 \
             ORDER BY name ASC LIMIT $3 OFFSET $4",
        )
        .bind(scope.tenant_id())
        .bind(parent_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))?;

        Ok(PageResponse::new(folders, page, total as u64))
    }

    /// Case-insensitive substring search on folder names, ordered by name.
    pub async fn search(
        &self,
        scope: &TenantScope,
        query: &str,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Folder>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folders \
             WHERE tenant_id = $1 AND instr(lower(name), lower($2)) > 0",
        )
        .bind(scope.tenant_id())
        .bind(query)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count search results", e)
        })?;

        let folders = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE tenant_id = $1 AND instr(lower(name), lower($2)) > 0 \
             ORDER BY name ASC, path ASC LIMIT $3 OFFSET $4",
        )
        .bind(scope.tenant_id())
        .bind(query)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search folders", e))?;

        Ok(PageResponse::new(folders, page, total as u64))
    }

    /// Whether a folder exists in the tenant.
    pub async fn exists(&self, scope: &TenantScope, id: FolderId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM folders WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check folder", e))
    }

    /// Whether a folder has neither child folders nor documents.
    pub async fn is_empty(&self, scope: &TenantScope, id: FolderId) -> AppResult<bool> {
        let mut conn = self.acquire().await?;
        if fetch_folder(&mut conn, scope, id).await?.is_none() {
            return Err(folder_not_found(id));
        }
        let (children, documents) = count_contents(&mut conn, scope, id).await?;
        Ok(children == 0 && documents == 0)
    }

    /// Create a folder, deriving its path from the parent's current path.
    pub async fn create(&self, scope: &TenantScope, data: &CreateFolder) -> AppResult<Folder> {
        let mut tx = begin(&self.pool).await?;

        let parent_path = match data.parent_id {
            Some(parent_id) => Some(
                fetch_folder(&mut tx, scope, parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found(format!("Parent folder {parent_id} not found"))
                    })?
                    .path,
            ),
            None => None,
        };
        let folder_path = path::child_path(parent_path.as_deref(), &data.name);
        let now = Utc::now();

        let folder = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders \
             (id, tenant_id, parent_id, name, path, depth, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING *",
        )
        .bind(FolderId::new())
        .bind(scope.tenant_id())
        .bind(data.parent_id)
        .bind(&data.name)
        .bind(&folder_path)
        .bind(path::depth(&folder_path))
        .bind(data.owner_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, "Failed to create folder", || {
                format!("Folder path '{folder_path}' already exists")
            })
        })?;

        commit(tx, "create folder").await?;
        Ok(folder)
    }

    /// Rename a folder and rewrite the paths of its subtree.
    pub async fn rename(
        &self,
        scope: &TenantScope,
        id: FolderId,
        new_name: &str,
    ) -> AppResult<Folder> {
        let mut tx = begin(&self.pool).await?;

        let folder = fetch_folder(&mut tx, scope, id)
            .await?
            .ok_or_else(|| folder_not_found(id))?;
        let new_path = path::child_path(path::parent_path(&folder.path), new_name);

        let renamed =
            relocate(&mut tx, scope, &folder, folder.parent_id, new_name, &new_path).await?;

        commit(tx, "rename folder").await?;
        Ok(renamed)
    }

    /// Move a folder under `new_parent_id` (or to the root level) and
    /// rewrite the paths of its subtree.
    pub async fn move_folder(
        &self,
        scope: &TenantScope,
        id: FolderId,
        new_parent_id: Option<FolderId>,
    ) -> AppResult<Folder> {
        let mut tx = begin(&self.pool).await?;

        let folder = fetch_folder(&mut tx, scope, id)
            .await?
            .ok_or_else(|| folder_not_found(id))?;

        let parent_path = match new_parent_id {
            Some(parent_id) => {
                if parent_id == id {
                    return Err(AppError::conflict("Cannot move a folder into itself"));
                }
                let parent = fetch_folder(&mut tx, scope, parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found(format!("Target folder {parent_id} not found"))
                    })?;
                if folder.is_ancestor_of(&parent) {
                    return Err(AppError::conflict(
                        "Cannot move a folder into one of its descendants",
                    ));
                }
                Some(parent.path)
            }
            None => None,
        };
        let new_path = path::child_path(parent_path.as_deref(), &folder.name);

        let moved =
            relocate(&mut tx, scope, &folder, new_parent_id, &folder.name, &new_path).await?;

        commit(tx, "move folder").await?;
        Ok(moved)
    }

    /// Delete an empty folder together with the grants attached to it.
    pub async fn delete(&self, scope: &TenantScope, id: FolderId) -> AppResult<Folder> {
        let mut tx = begin(&self.pool).await?;

        let folder = fetch_folder(&mut tx, scope, id)
            .await?
            .ok_or_else(|| folder_not_found(id))?;

        let (children, documents) = count_contents(&mut tx, scope, id).await?;
        if children > 0 || documents > 0 {
            return Err(AppError::conflict(format!(
                "Folder '{}' is not empty ({children} folders, {documents} documents)",
                folder.path
            )));
        }

        sqlx::query(
            "DELETE FROM permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3",
        )
        .bind(scope.tenant_id())
        .bind(ResourceType::Folder)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete folder grants", e)
        })?;

        sqlx::query("DELETE FROM folders WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(scope.tenant_id())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete folder", e))?;

        commit(tx, "delete folder").await?;
        Ok(folder)
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })
    }
}

fn folder_not_found(id: FolderId) -> AppError {
    AppError::not_found(format!("Folder {id} not found"))
}

/// Load a folder on an existing connection or transaction.
pub(crate) async fn fetch_folder(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: FolderId,
) -> AppResult<Option<Folder>> {
    sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
}

/// Every folder strictly below `folder_path`, ordered by path.
pub(crate) async fn fetch_descendants(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    folder_path: &str,
) -> AppResult<Vec<Folder>> {
    sqlx::query_as::<_, Folder>(
        "SELECT * FROM folders WHERE tenant_id = $1 AND substr(path, 1, length($2)) = $2 \
         ORDER BY path ASC",
    )
    .bind(scope.tenant_id())
    .bind(path::descendant_prefix(folder_path))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list descendants", e))
}

async fn count_contents(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: FolderId,
) -> AppResult<(i64, i64)> {
    let children: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE tenant_id = $1 AND parent_id = $2")
            .bind(scope.tenant_id())
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count children", e)
            })?;

    let documents: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE tenant_id = $1 AND folder_id = $2")
            .bind(scope.tenant_id())
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count documents", e)
            })?;

    Ok((children, documents))
}

/// Point `folder` at a new parent/name/path and rebase every descendant path.
///
/// Runs on the caller's transaction. When the parent changes, propagated
/// grant copies inside the subtree whose source lies outside it are dropped:
/// their ancestors are no longer the same.
async fn relocate(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    folder: &Folder,
    parent_id: Option<FolderId>,
    name: &str,
    new_path: &str,
) -> AppResult<Folder> {
    let now = Utc::now();

    let updated = sqlx::query_as::<_, Folder>(
        "UPDATE folders SET parent_id = $1, name = $2, path = $3, depth = $4, updated_at = $5 \
         WHERE id = $6 AND tenant_id = $7 RETURNING *",
    )
    .bind(parent_id)
    .bind(name)
    .bind(new_path)
    .bind(path::depth(new_path))
    .bind(now)
    .bind(folder.id)
    .bind(scope.tenant_id())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        write_error(e, "Failed to update folder", || {
            format!("Folder path '{new_path}' already exists")
        })
    })?;

    if new_path == folder.path {
        return Ok(updated);
    }

    let old_prefix = path::descendant_prefix(&folder.path);
    let new_prefix = path::descendant_prefix(new_path);
    let depth_delta = updated.depth - folder.depth;

    let rewritten = sqlx::query(
        "UPDATE folders \
         SET path = $1 || substr(path, length($2) + 1), depth = depth + $3, updated_at = $4 \
         WHERE tenant_id = $5 AND substr(path, 1, length($2)) = $2",
    )
    .bind(&new_prefix)
    .bind(&old_prefix)
    .bind(depth_delta)
    .bind(now)
    .bind(scope.tenant_id())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        write_error(e, "Failed to rewrite descendant paths", || {
            format!("A folder already exists below '{new_path}'")
        })
    })?
    .rows_affected();

    let mut dropped = 0;
    if parent_id != folder.parent_id {
        dropped = sqlx::query(
            "DELETE FROM permissions \
             WHERE tenant_id = $1 AND inherited = $2 AND resource_type = $3 \
             AND resource_id IN ( \
                 SELECT id FROM folders WHERE tenant_id = $1 \
                 AND (id = $4 OR substr(path, 1, length($5)) = $5)) \
             AND source_permission_id NOT IN ( \
                 SELECT p.id FROM permissions p JOIN folders f ON f.id = p.resource_id \
                 WHERE p.tenant_id = $1 AND p.resource_type = $3 AND f.tenant_id = $1 \
                 AND (f.id = $4 OR substr(f.path, 1, length($5)) = $5))",
        )
        .bind(scope.tenant_id())
        .bind(true)
        .bind(ResourceType::Folder)
        .bind(folder.id)
        .bind(&new_prefix)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to drop stale propagated grants", e)
        })?
        .rows_affected();
    }

    debug!(
        tenant_id = %scope.tenant_id(),
        folder_id = %folder.id,
        old_path = %folder.path,
        new_path = %new_path,
        descendants = rewritten,
        dropped_copies = dropped,
        "Subtree relocated"
    );

    Ok(updated)
}
