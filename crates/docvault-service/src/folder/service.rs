//! Folder CRUD, moves, and lookups over the materialized-path hierarchy.

use std::sync::Arc;

use tracing::info;

use docvault_core::error::AppError;
use docvault_core::types::{FolderId, PageRequest, PageResponse};
use docvault_database::repositories::folder::FolderRepository;
use docvault_entity::folder::{CreateFolder, Folder, PATH_SEPARATOR, path};

use crate::context::RequestContext;

/// Manages the folder hierarchy.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Folder repository.
    folder_repo: Arc<FolderRepository>,
}

/// Request to create a new folder.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateFolderRequest {
    /// Parent folder ID (None for root-level).
    pub parent_id: Option<FolderId>,
    /// Folder name.
    pub name: String,
}

/// Request to move a folder.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MoveFolderRequest {
    /// New parent folder ID (None moves the folder to the root level).
    pub new_parent_id: Option<FolderId>,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(folder_repo: Arc<FolderRepository>) -> Self {
        Self { folder_repo }
    }

    /// Creates a new folder under `req.parent_id`, or at the root level.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        req: CreateFolderRequest,
    ) -> Result<Folder, AppError> {
        let scope = ctx.scope()?;
        path::validate_name(&req.name)?;

        let folder = self
            .folder_repo
            .create(
                &scope,
                &CreateFolder {
                    parent_id: req.parent_id,
                    name: req.name,
                    owner_id: ctx.user_id,
                },
            )
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            folder_id = %folder.id,
            path = %folder.path,
            "Folder created"
        );

        Ok(folder)
    }

    /// Gets a folder by ID.
    pub async fn get_folder(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<Folder, AppError> {
        self.folder_repo.get(&ctx.scope()?, folder_id).await
    }

    /// Renames a folder; the subtree paths follow.
    pub async fn update_folder(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
        new_name: &str,
    ) -> Result<Folder, AppError> {
        let scope = ctx.scope()?;
        path::validate_name(new_name)?;

        let folder = self.folder_repo.rename(&scope, folder_id, new_name).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            folder_id = %folder_id,
            new_name = %new_name,
            path = %folder.path,
            "Folder renamed"
        );

        Ok(folder)
    }

    /// Moves a folder to a new parent.
    pub async fn move_folder(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
        req: MoveFolderRequest,
    ) -> Result<Folder, AppError> {
        let scope = ctx.scope()?;

        let folder = self
            .folder_repo
            .move_folder(&scope, folder_id, req.new_parent_id)
            .await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            folder_id = %folder_id,
            new_parent = ?req.new_parent_id,
            path = %folder.path,
            "Folder moved"
        );

        Ok(folder)
    }

    /// Deletes an empty folder.
    pub async fn delete_folder(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<(), AppError> {
        let scope = ctx.scope()?;
        let folder = self.folder_repo.delete(&scope, folder_id).await?;

        info!(
            user_id = %ctx.user_id,
            tenant_id = %scope.tenant_id(),
            folder_id = %folder_id,
            path = %folder.path,
            "Folder deleted"
        );

        Ok(())
    }

    /// Lists root folders.
    pub async fn list_root_folders(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<PageResponse<Folder>, AppError> {
        self.folder_repo.find_roots(&ctx.scope()?, &page).await
    }

    /// Lists children of a folder.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
        page: PageRequest,
    ) -> Result<PageResponse<Folder>, AppError> {
        self.folder_repo
            .find_children(&ctx.scope()?, folder_id, &page)
            .await
    }

    /// Returns the materialized path of a folder.
    pub async fn get_folder_path(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<String, AppError> {
        Ok(self.get_folder(ctx, folder_id).await?.path)
    }

    /// Resolves a folder by its full path.
    pub async fn get_by_path(
        &self,
        ctx: &RequestContext,
        folder_path: &str,
    ) -> Result<Folder, AppError> {
        if !folder_path.starts_with(PATH_SEPARATOR) {
            return Err(AppError::validation(format!(
                "Folder path must start with '{PATH_SEPARATOR}'"
            )));
        }

        self.folder_repo
            .find_by_path(&ctx.scope()?, folder_path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder '{folder_path}' not found")))
    }

    /// Whether the folder exists in the caller's tenant.
    pub async fn exists(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<bool, AppError> {
        self.folder_repo.exists(&ctx.scope()?, folder_id).await
    }

    /// Whether the folder has neither sub-folders nor documents.
    pub async fn is_empty(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
    ) -> Result<bool, AppError> {
        self.folder_repo.is_empty(&ctx.scope()?, folder_id).await
    }

    /// Searches folders by a case-insensitive substring of their name.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        page: PageRequest,
    ) -> Result<PageResponse<Folder>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query cannot be empty"));
        }
        self.folder_repo.search(&ctx.scope()?, query, &page).await
    }
}
