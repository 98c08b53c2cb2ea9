//! Document aggregate model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docvault_core::types::{DocumentId, DocumentVersionId, FolderId, TenantId, UserId};

use super::status::VersionStatus;

/// A document. `current_version_id`, `version_count`, and `status` mirror the
/// version chain and are only written together with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The folder containing this document.
    pub folder_id: FolderId,
    /// Display name.
    pub name: String,
    /// The document owner.
    pub owner_id: UserId,
    /// Latest version, if any has been added.
    pub current_version_id: Option<DocumentVersionId>,
    /// Number of versions in the chain.
    pub version_count: i64,
    /// Status of the current version.
    pub status: VersionStatus,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
    /// When the document or its chain last changed.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocument {
    /// Target folder.
    pub folder_id: FolderId,
    /// Display name.
    pub name: String,
    /// The document owner.
    pub owner_id: UserId,
}
