//! Per-document metadata key-value store.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use docvault_core::TenantScope;
use docvault_core::error::{AppError, ErrorKind};
use docvault_core::result::AppResult;
use docvault_core::types::{DocumentId, MetadataId};
use docvault_entity::document::DocumentMetadata;

use super::document::fetch_document;
use super::{begin, commit};

/// Repository for document metadata.
#[derive(Debug, Clone)]
pub struct MetadataRepository {
    pool: SqlitePool,
}

impl MetadataRepository {
    /// Create a new metadata repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All entries of a document, ordered by key.
    pub async fn list(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
    ) -> AppResult<Vec<DocumentMetadata>> {
        let mut tx = begin(&self.pool).await?;
        ensure_document(&mut tx, scope, document_id).await?;
        let entries = fetch_entries(&mut tx, document_id).await?;
        commit(tx, "list metadata").await?;
        Ok(entries)
    }

    /// Insert or overwrite one entry.
    pub async fn upsert(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
        key: &str,
        value: &str,
    ) -> AppResult<DocumentMetadata> {
        let mut tx = begin(&self.pool).await?;
        ensure_document(&mut tx, scope, document_id).await?;
        let entry = upsert_entry(&mut tx, document_id, key, value).await?;
        touch_document(&mut tx, scope, document_id).await?;
        commit(tx, "upsert metadata").await?;
        Ok(entry)
    }

    /// Overwrite the value of an existing entry.
    pub async fn update(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
        key: &str,
        value: &str,
    ) -> AppResult<DocumentMetadata> {
        let mut tx = begin(&self.pool).await?;
        ensure_document(&mut tx, scope, document_id).await?;

        let entry = sqlx::query_as::<_, DocumentMetadata>(
            "UPDATE document_metadata SET value = $1, updated_at = $2 \
             WHERE document_id = $3 AND key = $4 RETURNING *",
        )
        .bind(value)
        .bind(Utc::now())
        .bind(document_id)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update metadata", e))?
        .ok_or_else(|| key_not_found(document_id, key))?;

        touch_document(&mut tx, scope, document_id).await?;
        commit(tx, "update metadata").await?;
        Ok(entry)
    }

    /// Remove an existing entry.
    pub async fn delete(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
        key: &str,
    ) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;
        ensure_document(&mut tx, scope, document_id).await?;

        let removed =
            sqlx::query("DELETE FROM document_metadata WHERE document_id = $1 AND key = $2")
                .bind(document_id)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete metadata", e)
                })?
            .rows_affected();
        if removed == 0 {
            return Err(key_not_found(document_id, key));
        }

        touch_document(&mut tx, scope, document_id).await?;
        commit(tx, "delete metadata").await?;
        Ok(())
    }

    /// Clear every entry and write `entries` instead.
    pub async fn replace_all(
        &self,
        scope: &TenantScope,
        document_id: DocumentId,
        entries: &[(String, String)],
    ) -> AppResult<Vec<DocumentMetadata>> {
        let mut tx = begin(&self.pool).await?;
        ensure_document(&mut tx, scope, document_id).await?;

        sqlx::query("DELETE FROM document_metadata WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to clear metadata", e)
            })?;

        for (key, value) in entries {
            upsert_entry(&mut tx, document_id, key, value).await?;
        }
        touch_document(&mut tx, scope, document_id).await?;

        let stored = fetch_entries(&mut tx, document_id).await?;
        commit(tx, "replace metadata").await?;
        Ok(stored)
    }
}

fn key_not_found(document_id: DocumentId, key: &str) -> AppError {
    AppError::not_found(format!("Metadata key '{key}' not found on document {document_id}"))
}

async fn ensure_document(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    document_id: DocumentId,
) -> AppResult<()> {
    match fetch_document(conn, scope, document_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found(format!("Document {document_id} not found"))),
    }
}

async fn fetch_entries(
    conn: &mut SqliteConnection,
    document_id: DocumentId,
) -> AppResult<Vec<DocumentMetadata>> {
    sqlx::query_as::<_, DocumentMetadata>(
        "SELECT * FROM document_metadata WHERE document_id = $1 ORDER BY key ASC",
    )
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list metadata", e))
}

async fn upsert_entry(
    conn: &mut SqliteConnection,
    document_id: DocumentId,
    key: &str,
    value: &str,
) -> AppResult<DocumentMetadata> {
    let now = Utc::now();
    sqlx::query_as::<_, DocumentMetadata>(
        "INSERT INTO document_metadata (id, document_id, key, value, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $5) \
         ON CONFLICT (document_id, key) \
         DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at \
         RETURNING *",
    )
    .bind(MetadataId::new())
    .bind(document_id)
    .bind(key)
    .bind(value)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write metadata", e))
}

async fn touch_document(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    document_id: DocumentId,
) -> AppResult<()> {
    sqlx::query("UPDATE documents SET updated_at = $1 WHERE id = $2 AND tenant_id = $3")
        .bind(Utc::now())
        .bind(document_id)
        .bind(scope.tenant_id())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to touch document", e))?;
    Ok(())
}
