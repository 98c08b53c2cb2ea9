//! Document metadata entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use docvault_core::types::{DocumentId, MetadataId};

/// One key-value pair attached to a document. Keys are unique per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentMetadata {
    /// Unique entry identifier.
    pub id: MetadataId,
    /// The document this entry belongs to.
    pub document_id: DocumentId,
    /// Metadata key.
    pub key: String,
    /// Metadata value.
    pub value: String,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
    /// When this entry was last written.
    pub updated_at: DateTime<Utc>,
}
