//! Documents, their append-only version chain, and per-document metadata.

use std::sync::Arc;

use tracing::info;

use docvault_core::error::AppError;
use docvault_core::types::{DocumentId, DocumentVersionId, FolderId, PageRequest, PageResponse};
use docvault_database::repositories::document::DocumentRepository;
use docvault_database::repositories::metadata::MetadataRepository;
use docvault_entity::document::{
    CreateDocument, Document, DocumentMetadata, DocumentVersion, NewVersion, VersionStatus,
};

use crate::context::RequestContext;

/// Maximum length of a document name or metadata key.
const MAX_NAME_LEN: usize = 255;

/// Manages documents, versions, and metadata.
#[derive(Debug, Clone)]
pub struct DocumentService {
    /// Document and version repository.
    document_repo: Arc<DocumentRepository>,
    /// Metadata repository.
    metadata_repo: Arc<MetadataRepository>,
}

/// Request to create a document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateDocumentRequest {
    /// Containing folder.
    pub folder_id: FolderId,
    /// Document name.
    pub name: String,
}

/// Request to append a version.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddVersionRequest {
    /// Expected version number; assigned when absent.
    pub version_number: Option<i64>,
    /// Content size in bytes.
    pub size_bytes: i64,
    /// Content hash.
    pub content_hash: String,
    /// Object store key.
    pub storage_key: String,
}

impl AddVersionRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.version_number.is_some_and(|n| n < 1) {
            return Err(AppError::validation("Version numbers start at 1"));
        }
        if self.size_bytes < 0 {
            return Err(AppError::validation("Size cannot be negative"));
        }
        if self.content_hash.trim().is_empty() {
            return Err(AppError::validation("Content hash is required"));
        }
        if self.storage_key.trim().is_empty() {
            return Err(AppError::validation("Storage key is required"));
        }
        Ok(())
    }
}

fn validate_label(label: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{label} cannot be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{label} exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

impl DocumentService {
    /// Creates a new document service.
    pub fn new(
        document_repo: Arc<DocumentRepository>,
        metadata_repo: Arc<MetadataRepository>,
    ) -> Self {
        Self {
            document_repo,
            metadata_repo,
        }
    }

    /// Creates an empty document in a folder.
    pub async fn create_document(
        &self,
        ctx: &RequestContext,
        req: CreateDocumentRequest,
    ) -> Result<Document, AppError> {
        let scope = ctx.scope()?;
        validate_label("Document name", &req.name)?;

        let document = self
            .document_repo
            .create(
                &scope,
                &CreateDocument {
                    folder_id: req.folder_id,
                    name: req.name,
                    owner_id: ctx.user_id,
                },
            )
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document.id,
            folder_id = %document.folder_id,
            name = %document.name,
            "Document created"
        );

        Ok(document)
    }

    /// Gets a document by ID.
    pub async fn get_document(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
    ) -> Result<Document, AppError> {
        self.document_repo.get(&ctx.scope()?, document_id).await
    }

    /// Lists the documents in a folder. The folder must exist in the tenant.
    pub async fn list_documents(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
        page: PageRequest,
    ) -> Result<PageResponse<Document>, AppError> {
        self.document_repo
            .find_by_folder(&ctx.scope()?, folder_id, &page)
            .await
    }

    /// Deletes a document with its versions and metadata.
    pub async fn delete_document(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
    ) -> Result<(), AppError> {
        let scope = ctx.scope()?;
        let document = self.document_repo.delete(&scope, document_id).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            versions = document.version_count,
            "Document deleted"
        );

        Ok(())
    }

    /// Appends a version; the document head moves to it.
    pub async fn add_version(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        req: AddVersionRequest,
    ) -> Result<DocumentVersion, AppError> {
        let scope = ctx.scope()?;
        req.validate()?;

        let (version, document) = self
            .document_repo
            .add_version(
                &scope,
                &NewVersion {
                    document_id,
                    version_number: req.version_number,
                    size_bytes: req.size_bytes,
                    content_hash: req.content_hash,
                    storage_key: req.storage_key,
                    created_by: ctx.user_id,
                },
            )
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            version_id = %version.id,
            version_number = version.version_number,
            version_count = document.version_count,
            "Version added"
        );

        Ok(version)
    }

    /// Gets a version by ID.
    pub async fn get_version(
        &self,
        ctx: &RequestContext,
        version_id: DocumentVersionId,
    ) -> Result<DocumentVersion, AppError> {
        self.document_repo
            .find_version(&ctx.scope()?, version_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version_id} not found")))
    }

    /// Lists every version of a document, oldest first.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentVersion>, AppError> {
        self.document_repo
            .list_versions(&ctx.scope()?, document_id)
            .await
    }

    /// Records the outcome of downstream processing for a version.
    pub async fn update_version_status(
        &self,
        ctx: &RequestContext,
        version_id: DocumentVersionId,
        status: VersionStatus,
    ) -> Result<DocumentVersion, AppError> {
        let scope = ctx.scope()?;
        let version = self
            .document_repo
            .update_version_status(&scope, version_id, status)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %version.document_id,
            version_id = %version_id,
            status = %version.status,
            "Version status updated"
        );

        Ok(version)
    }

    /// All metadata entries of a document.
    pub async fn get_metadata(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentMetadata>, AppError> {
        self.metadata_repo.list(&ctx.scope()?, document_id).await
    }

    /// Sets a metadata entry, creating or overwriting it.
    pub async fn add_metadata(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        key: &str,
        value: &str,
    ) -> Result<DocumentMetadata, AppError> {
        let scope = ctx.scope()?;
        validate_label("Metadata key", key)?;

        let entry = self
            .metadata_repo
            .upsert(&scope, document_id, key, value)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            key = %key,
            "Metadata set"
        );

        Ok(entry)
    }

    /// Overwrites an existing metadata entry.
    pub async fn update_metadata(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        key: &str,
        value: &str,
    ) -> Result<DocumentMetadata, AppError> {
        let scope = ctx.scope()?;
        validate_label("Metadata key", key)?;

        let entry = self
            .metadata_repo
            .update(&scope, document_id, key, value)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            key = %key,
            "Metadata updated"
        );

        Ok(entry)
    }

    /// Removes an existing metadata entry.
    pub async fn delete_metadata(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        key: &str,
    ) -> Result<(), AppError> {
        let scope = ctx.scope()?;
        self.metadata_repo.delete(&scope, document_id, key).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            key = %key,
            "Metadata deleted"
        );

        Ok(())
    }

    /// Replaces the whole metadata map of a document.
    pub async fn replace_metadata(
        &self,
        ctx: &RequestContext,
        document_id: DocumentId,
        entries: Vec<(String, String)>,
    ) -> Result<Vec<DocumentMetadata>, AppError> {
        let scope = ctx.scope()?;
        for (key, _) in &entries {
            validate_label("Metadata key", key)?;
        }

        let stored = self
            .metadata_repo
            .replace_all(&scope, document_id, &entries)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            document_id = %document_id,
            entries = stored.len(),
            "Metadata replaced"
        );

        Ok(stored)
    }
}
