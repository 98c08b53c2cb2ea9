//! Document version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docvault_core::types::{DocumentId, DocumentVersionId, UserId};

use super::status::VersionStatus;

/// One entry in a document's append-only version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentVersion {
    /// Unique version identifier.
    pub id: DocumentVersionId,
    /// The document this version belongs to.
    pub document_id: DocumentId,
    /// Sequential version number, starting at 1.
    pub version_number: i64,
    /// Content size in bytes.
    pub size_bytes: i64,
    /// Content hash (e.g. hex SHA-256).
    pub content_hash: String,
    /// Processing status.
    pub status: VersionStatus,
    /// Opaque pointer into the object store.
    pub storage_key: String,
    /// User who created this version.
    pub created_by: UserId,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

/// Data for appending a version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
    /// Target document.
    pub document_id: DocumentId,
    /// Expected version number; assigned as `max + 1` when absent.
    pub version_number: Option<i64>,
    /// Content size in bytes.
    pub size_bytes: i64,
    /// Content hash.
    pub content_hash: String,
    /// Opaque pointer into the object store.
    pub storage_key: String,
    /// Who is adding the version.
    pub created_by: UserId,
}
