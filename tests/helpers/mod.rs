//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docvault_core::config::DatabaseConfig;
use docvault_core::types::{FolderId, RoleId, TenantId, UserId};
use docvault_database::migration::run_migrations;
use docvault_database::{
    DatabasePool, DocumentRepository, FolderRepository, MetadataRepository, PermissionRepository,
};
use docvault_entity::document::Document;
use docvault_entity::folder::Folder;
use docvault_service::document::{AddVersionRequest, CreateDocumentRequest};
use docvault_service::folder::CreateFolderRequest;
use docvault_service::{
    DocumentService, FolderService, PermissionResolver, PermissionService, RequestContext,
};

/// Test application: the full service graph over a private in-memory database.
pub struct TestApp {
    /// Database pool for direct queries.
    pub db: DatabasePool,
    /// Folder service.
    pub folders: FolderService,
    /// Permission service.
    pub permissions: PermissionService,
    /// Document service.
    pub documents: DocumentService,
}

impl TestApp {
    /// Create a new test application with a migrated, empty database.
    pub async fn new() -> Self {
        Self::with_config(&DatabaseConfig::in_memory()).await
    }

    /// Create a test application over a fresh database file at `path`.
    pub async fn on_disk(path: &Path) -> Self {
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 8,
            ..DatabaseConfig::default()
        };
        Self::with_config(&config).await
    }

    async fn with_config(config: &DatabaseConfig) -> Self {
        let db = DatabasePool::connect(config)
            .await
            .expect("Failed to open database");

        run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");

        let pool = db.pool().clone();
        let folder_repo = Arc::new(FolderRepository::new(pool.clone()));
        let permission_repo = Arc::new(PermissionRepository::new(pool.clone()));
        let document_repo = Arc::new(DocumentRepository::new(pool.clone()));
        let metadata_repo = Arc::new(MetadataRepository::new(pool));

        let resolver = Arc::new(PermissionResolver::new(
            Arc::clone(&folder_repo),
            Arc::clone(&permission_repo),
        ));

        Self {
            folders: FolderService::new(Arc::clone(&folder_repo)),
            permissions: PermissionService::new(permission_repo, resolver),
            documents: DocumentService::new(document_repo, metadata_repo),
            db,
        }
    }

    /// A context for a fresh user in a fresh tenant with one role.
    pub fn tenant_ctx(&self) -> RequestContext {
        RequestContext::new(UserId::new(), TenantId::new(), vec![RoleId::new()])
    }

    /// Create a folder, panicking on failure.
    pub async fn folder(
        &self,
        ctx: &RequestContext,
        parent: Option<&Folder>,
        name: &str,
    ) -> Folder {
        self.folders
            .create_folder(
                ctx,
                CreateFolderRequest {
                    parent_id: parent.map(|p| p.id),
                    name: name.to_string(),
                },
            )
            .await
            .unwrap_or_else(|e| panic!("Failed to create folder '{name}': {e}"))
    }

    /// Create a document, panicking on failure.
    pub async fn document(
        &self,
        ctx: &RequestContext,
        folder_id: FolderId,
        name: &str,
    ) -> Document {
        self.documents
            .create_document(
                ctx,
                CreateDocumentRequest {
                    folder_id,
                    name: name.to_string(),
                },
            )
            .await
            .unwrap_or_else(|e| panic!("Failed to create document '{name}': {e}"))
    }

    /// Reload a folder by ID.
    pub async fn reload(&self, ctx: &RequestContext, folder: &Folder) -> Folder {
        self.folders
            .get_folder(ctx, folder.id)
            .await
            .expect("Folder should still exist")
    }
}

/// A unique database file path under the system temp directory.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("docvault-test-{}.db", uuid::Uuid::new_v4()))
}

/// Remove a database file and its WAL side files, ignoring missing ones.
pub fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(file));
    }
}

/// A minimal version request.
pub fn version(hash: &str) -> AddVersionRequest {
    AddVersionRequest {
        version_number: None,
        size_bytes: 1024,
        content_hash: hash.to_string(),
        storage_key: format!("objects/{hash}"),
    }
}

/// Assert the path invariant for a folder given its parent.
pub fn assert_path_invariant(folder: &Folder, parent: Option<&Folder>) {
    match parent {
        Some(parent) => {
            assert_eq!(folder.path, format!("{}/{}", parent.path, folder.name));
            assert_eq!(folder.depth, parent.depth + 1);
            assert_eq!(folder.parent_id, Some(parent.id));
        }
        None => {
            assert_eq!(folder.path, format!("/{}", folder.name));
            assert_eq!(folder.depth, 0);
            assert_eq!(folder.parent_id, None);
        }
    }
}
