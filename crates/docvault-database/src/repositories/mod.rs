//! Tenant-scoped repository implementations.
//!
//! Every public method takes a [`TenantScope`](docvault_core::TenantScope)
//! and filters by its tenant. A row owned by another tenant is reported
//! exactly like a missing row. Multi-step mutations run inside one
//! transaction; dropping an uncommitted transaction rolls it back.

pub mod document;
pub mod folder;
pub mod metadata;
pub mod permission;

pub use document::DocumentRepository;
pub use folder::FolderRepository;
pub use metadata::MetadataRepository;
pub use permission::PermissionRepository;

use sqlx::{Sqlite, SqlitePool, Transaction};

use docvault_core::error::{AppError, ErrorKind};
use docvault_core::result::AppResult;

/// Open a write transaction on `pool`.
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent writers
/// queue on the busy timeout instead of failing to upgrade a read lock.
pub(crate) async fn begin(pool: &SqlitePool) -> AppResult<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))
}

/// Commit `tx`, wrapping failures with `context`.
pub(crate) async fn commit(tx: Transaction<'static, Sqlite>, context: &str) -> AppResult<()> {
    tx.commit().await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to commit: {context}"),
            e,
        )
    })
}

/// Map a write failure, turning unique-constraint violations into conflicts.
pub(crate) fn write_error(
    err: sqlx::Error,
    context: &str,
    conflict: impl FnOnce() -> String,
) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(conflict())
        }
        _ => AppError::with_source(ErrorKind::Database, context.to_string(), err),
    }
}
