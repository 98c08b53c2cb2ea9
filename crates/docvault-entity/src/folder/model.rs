//! Folder entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docvault_core::types::{FolderId, TenantId, UserId};

use super::path;

/// A folder in a tenant's hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: FolderId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Parent folder ID (null for root folders).
    pub parent_id: Option<FolderId>,
    /// Folder name (a single path segment).
    pub name: String,
    /// Full materialized path (e.g. `/Projects/2024`).
    pub path: String,
    /// Depth in the folder tree (0 for root).
    pub depth: i64,
    /// The folder owner.
    pub owner_id: UserId,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// When the folder was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Whether `other` lies strictly below this folder.
    pub fn is_ancestor_of(&self, other: &Folder) -> bool {
        self.tenant_id == other.tenant_id && path::is_descendant_path(&other.path, &self.path)
    }
}

/// Data required to create a new folder. Path and depth are derived by the
/// store from the parent at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolder {
    /// Parent folder (None for root).
    pub parent_id: Option<FolderId>,
    /// Folder name.
    pub name: String,
    /// The folder owner.
    pub owner_id: UserId,
}
