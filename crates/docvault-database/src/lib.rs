//! # docvault-database
//!
//! SQLite connection management and the tenant-scoped repositories backing
//! the folder hierarchy, permission, and document version stores.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{
    DocumentRepository, FolderRepository, MetadataRepository, PermissionRepository,
};
