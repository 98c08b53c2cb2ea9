//! Document version store: documents, their version chain, and the
//! denormalized head kept on the document row.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use docvault_core::TenantScope;
use docvault_core::error::{AppError, ErrorKind};
use docvault_core::result::AppResult;
use docvault_core::types::{DocumentId, DocumentVersionId, FolderId, PageRequest, PageResponse};
use docvault_entity::document::{
    CreateDocument, Document, DocumentVersion, NewVersion, VersionStatus,
};
use docvault_entity::permission::ResourceType;

use super::folder::fetch_folder;
use super::{begin, commit, write_error};

/// Repository for documents and document versions.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Create a new document repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a document by ID.
    pub async fn find_by_id(
        &self,
        scope: &TenantScope,
        id: DocumentId,
    ) -> AppResult<Option<Document>> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(scope.tenant_id())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find document", e))
    }

    /// Find a document by ID or fail with not-found.
    pub async fn get(&self, scope: &TenantScope, id: DocumentId) -> AppResult<Document> {
        self.find_by_id(scope, id)
            .await?
            .ok_or_else(|| document_not_found(id))
    }

    /// Documents in a folder, ordered by name.
    pub async fn find_by_folder(
        &self,
        scope: &TenantScope,
        folder_id: FolderId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Document>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })?;
        if fetch_folder(&mut conn, scope, folder_id).await?.is_none() {
            return Err(AppError::not_found(format!("Folder {folder_id} not found")));
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE tenant_id = $1 AND folder_id = $2",
        )
        .bind(scope.tenant_id())
        .bind(folder_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count documents", e))?;

        let documents = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE tenant_id = $1 AND folder_id = $2 \
             ORDER BY name ASC LIMIT $3 OFFSET $4",
        )
        .bind(scope.tenant_id())
        .bind(folder_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list documents", e))?;

        Ok(PageResponse::new(documents, page, total as u64))
    }

    /// Create an empty document in an existing folder.
    pub async fn create(&self, scope: &TenantScope, data: &CreateDocument) -> AppResult<Document> {
        let mut tx = begin(&self.pool).await?;

        if fetch_folder(&mut tx, scope, data.folder_id).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Folder {} not found",
                data.folder_id
            )));
        }

        let now = Utc::now();
        let document = sqlx::query_as::<_, Document>(
            "INSERT INTO documents (id, tenant_id, folder_id, name, owner_id, current_version_id, \
             version_count, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NULL, 0, $6, $7, $7) RETURNING *",
        )
        .bind(DocumentId::new())
        .bind(scope.tenant_id())
        .bind(data.folder_id)
        .bind(&data.name)
        .bind(data.owner_id)
        .bind(VersionStatus::default())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, "Failed to create document", || {
                format!("Document '{}' already exists in this folder", data.name)
            })
        })?;

        commit(tx, "create document").await?;
        Ok(document)
    }

    /// Delete a document together with its versions, metadata, and grants.
    pub async fn delete(&self, scope: &TenantScope, id: DocumentId) -> AppResult<Document> {
        let mut tx = begin(&self.pool).await?;

        let document = fetch_document(&mut tx, scope, id)
            .await?
            .ok_or_else(|| document_not_found(id))?;

        sqlx::query("DELETE FROM document_metadata WHERE document_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete document metadata", e)
            })?;

        sqlx::query("DELETE FROM document_versions WHERE document_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete document versions", e)
            })?;

        sqlx::query(
            "DELETE FROM permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3",
        )
        .bind(scope.tenant_id())
        .bind(ResourceType::Document)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete document grants", e)
        })?;

        sqlx::query("DELETE FROM documents WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(scope.tenant_id())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete document", e)
            })?;

        commit(tx, "delete document").await?;
        Ok(document)
    }

    /// Append a version and advance the document head in one transaction.
    ///
    /// The new number must be exactly the current maximum plus one. When
    /// `version_number` is absent it is assigned that way.
    pub async fn add_version(
        &self,
        scope: &TenantScope,
        data: &NewVersion,
    ) -> AppResult<(DocumentVersion, Document)> {
        let mut tx = begin(&self.pool).await?;

        if fetch_document(&mut tx, scope, data.document_id).await?.is_none() {
            return Err(document_not_found(data.document_id));
        }

        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version_number), 0) FROM document_versions WHERE document_id = $1",
        )
        .bind(data.document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to read latest version", e)
        })?;

        let next = max + 1;
        match data.version_number {
            Some(requested) if requested != next => {
                return Err(AppError::conflict(format!(
                    "Version {requested} is out of sequence for document {}; expected {next}",
                    data.document_id
                )));
            }
            _ => {}
        }

        let now = Utc::now();
        let version = sqlx::query_as::<_, DocumentVersion>(
            "INSERT INTO document_versions (id, document_id, version_number, size_bytes, \
             content_hash, status, storage_key, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(DocumentVersionId::new())
        .bind(data.document_id)
        .bind(next)
        .bind(data.size_bytes)
        .bind(&data.content_hash)
        .bind(VersionStatus::Processing)
        .bind(&data.storage_key)
        .bind(data.created_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            write_error(e, "Failed to insert version", || {
                format!(
                    "Version {next} already exists for document {}",
                    data.document_id
                )
            })
        })?;

        let document = sqlx::query_as::<_, Document>(
            "UPDATE documents SET version_count = version_count + 1, current_version_id = $1, \
             status = $2, updated_at = $3 WHERE id = $4 AND tenant_id = $5 RETURNING *",
        )
        .bind(version.id)
        .bind(version.status)
        .bind(now)
        .bind(data.document_id)
        .bind(scope.tenant_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update document head", e)
        })?;

        commit(tx, "add version").await?;

        debug!(
            document_id = %document.id,
            version_number = version.version_number,
            version_count = document.version_count,
            "Version appended"
        );
        Ok((version, document))
    }

    /// Find a version through its owning document's tenant.
    pub async fn find_version(
        &self,
        scope: &TenantScope,
        id: DocumentVersionId,
    ) -> AppResult<Option<DocumentVersion>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
        })?;
        fetch_version(&mut conn, scope, id).await
    }

    /// Every version of a document, oldest first.
    pub async fn list_versions(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
    ) -> AppResult<Vec<DocumentVersion>> {
        if self.find_by_id(scope, document_id).await?.is_none() {
            return Err(document_not_found(document_id));
        }

        sqlx::query_as::<_, DocumentVersion>(
            "SELECT * FROM document_versions WHERE document_id = $1 ORDER BY version_number ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list versions", e))
    }

    /// Move a version along its status state machine. When the version is the
    /// document's current one, the document status follows in the same
    /// transaction.
    pub async fn update_version_status(
        &self,
        scope: &TenantScope,
        id: DocumentVersionId,
        status: VersionStatus,
    ) -> AppResult<DocumentVersion> {
        let mut tx = begin(&self.pool).await?;

        let version = fetch_version(&mut tx, scope, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {id} not found")))?;

        if version.status == status {
            return Ok(version);
        }
        if !version.status.can_transition_to(status) {
            return Err(AppError::conflict(format!(
                "Version {id} cannot move from '{}' to '{status}'",
                version.status
            )));
        }

        let updated = sqlx::query_as::<_, DocumentVersion>(
            "UPDATE document_versions SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update version status", e)
        })?;

        let mirrored = sqlx::query(
            "UPDATE documents SET status = $1, updated_at = $2 \
             WHERE id = $3 AND tenant_id = $4 AND current_version_id = $5",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(updated.document_id)
        .bind(scope.tenant_id())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mirror document status", e)
        })?
        .rows_affected();

        commit(tx, "update version status").await?;

        debug!(
            version_id = %id,
            status = %status,
            mirrored = mirrored > 0,
            "Version status updated"
        );
        Ok(updated)
    }
}

fn document_not_found(id: DocumentId) -> AppError {
    AppError::not_found(format!("Document {id} not found"))
}

/// Load a document on an existing connection or transaction.
pub(crate) async fn fetch_document(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: DocumentId,
) -> AppResult<Option<Document>> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find document", e))
}

async fn fetch_version(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: DocumentVersionId,
) -> AppResult<Option<DocumentVersion>> {
    sqlx::query_as::<_, DocumentVersion>(
        "SELECT v.* FROM document_versions v \
         JOIN documents d ON d.id = v.document_id \
         WHERE v.id = $1 AND d.tenant_id = $2",
    )
    .bind(id)
    .bind(scope.tenant_id())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
}
