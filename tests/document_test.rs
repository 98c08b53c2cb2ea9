//! Integration tests for documents, the version chain, and metadata.

mod helpers;

use std::sync::Arc;

use docvault_core::types::{DocumentId, DocumentVersionId, FolderId, PageRequest};
use docvault_entity::document::VersionStatus;

use helpers::version;

#[tokio::test]
async fn test_sequential_versions_advance_head() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "design.md").await;
    assert_eq!(doc.version_count, 0);
    assert_eq!(doc.current_version_id, None);

    let mut last = None;
    for i in 1..=5 {
        let v = app
            .documents
            .add_version(&ctx, doc.id, version(&format!("hash-{i}")))
            .await
            .unwrap();
        assert_eq!(v.version_number, i);
        assert_eq!(v.status, VersionStatus::Processing);
        last = Some(v);
    }

    let doc = app.documents.get_document(&ctx, doc.id).await.unwrap();
    let last = last.unwrap();
    assert_eq!(doc.version_count, 5);
    assert_eq!(doc.current_version_id, Some(last.id));
    assert_eq!(doc.status, VersionStatus::Processing);

    let numbers: Vec<i64> = app
        .documents
        .list_versions(&ctx, doc.id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, [1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_out_of_sequence_version_is_conflict() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "a.txt").await;

    let mut req = version("h1");
    req.version_number = Some(1);
    app.documents.add_version(&ctx, doc.id, req).await.unwrap();

    for n in [1, 3] {
        let mut req = version("h2");
        req.version_number = Some(n);
        let err = app.documents.add_version(&ctx, doc.id, req).await.unwrap_err();
        assert!(err.is_conflict());
    }

    let doc = app.documents.get_document(&ctx, doc.id).await.unwrap();
    assert_eq!(doc.version_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_versions_on_disk_are_serialized() {
    let db_path = helpers::temp_db_path();
    let app = Arc::new(helpers::TestApp::on_disk(&db_path).await);
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "busy.txt").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = Arc::clone(&app);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            app.documents
                .add_version(&ctx, doc.id, version(&format!("c{i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let numbers: Vec<i64> = app
        .documents
        .list_versions(&ctx, doc.id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    let doc = app.documents.get_document(&ctx, doc.id).await.unwrap();
    assert_eq!(doc.version_count, 8);

    app.db.close().await;
    helpers::remove_db_files(&db_path);
}

#[tokio::test]
async fn test_version_for_missing_document_is_not_found() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();

    let err = app
        .documents
        .add_version(&ctx, DocumentId::new(), version("h"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_status_transitions_mirror_current_version() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "scan.pdf").await;

    let v1 = app.documents.add_version(&ctx, doc.id, version("h1")).await.unwrap();
    let v2 = app.documents.add_version(&ctx, doc.id, version("h2")).await.unwrap();

    // Not current: the document keeps its status.
    let updated = app
        .documents
        .update_version_status(&ctx, v1.id, VersionStatus::Quarantined)
        .await
        .unwrap();
    assert_eq!(updated.status, VersionStatus::Quarantined);
    let current = app.documents.get_document(&ctx, doc.id).await.unwrap();
    assert_eq!(current.status, VersionStatus::Processing);

    app.documents
        .update_version_status(&ctx, v2.id, VersionStatus::Available)
        .await
        .unwrap();
    let current = app.documents.get_document(&ctx, doc.id).await.unwrap();
    assert_eq!(current.status, VersionStatus::Available);

    // Same status again is a no-op; leaving a terminal state is not.
    app.documents
        .update_version_status(&ctx, v2.id, VersionStatus::Available)
        .await
        .unwrap();
    for next in [VersionStatus::Processing, VersionStatus::Quarantined] {
        let err = app
            .documents
            .update_version_status(&ctx, v2.id, next)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    let v2 = app.documents.get_version(&ctx, v2.id).await.unwrap();
    assert_eq!(v2.status, VersionStatus::Available);
    assert!(
        app.documents
            .get_version(&ctx, DocumentVersionId::new())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_metadata_upsert_update_delete() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "contract.pdf").await;

    let first = app
        .documents
        .add_metadata(&ctx, doc.id, "author", "Ada")
        .await
        .unwrap();
    let second = app
        .documents
        .add_metadata(&ctx, doc.id, "author", "Grace")
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.value, "Grace");

    let entries = app.documents.get_metadata(&ctx, doc.id).await.unwrap();
    assert_eq!(entries.len(), 1);

    let updated = app
        .documents
        .update_metadata(&ctx, doc.id, "author", "Linus")
        .await
        .unwrap();
    assert_eq!(updated.value, "Linus");

    assert!(
        app.documents
            .update_metadata(&ctx, doc.id, "missing", "x")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        app.documents
            .delete_metadata(&ctx, doc.id, "missing")
            .await
            .unwrap_err()
            .is_not_found()
    );

    app.documents.delete_metadata(&ctx, doc.id, "author").await.unwrap();
    assert!(app.documents.get_metadata(&ctx, doc.id).await.unwrap().is_empty());

    let touched = app.documents.get_document(&ctx, doc.id).await.unwrap();
    assert!(touched.updated_at >= doc.updated_at);
}

#[tokio::test]
async fn test_replace_metadata() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;
    let doc = app.document(&ctx, folder.id, "notes.txt").await;

    app.documents
        .add_metadata(&ctx, doc.id, "stale", "1")
        .await
        .unwrap();

    let stored = app
        .documents
        .replace_metadata(
            &ctx,
            doc.id,
            vec![
                ("lang".to_string(), "en".to_string()),
                ("category".to_string(), "legal".to_string()),
            ],
        )
        .await
        .unwrap();
    let keys: Vec<_> = stored.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, ["category", "lang"]);

    let err = app
        .documents
        .replace_metadata(&ctx, doc.id, vec![("".to_string(), "x".to_string())])
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(app.documents.get_metadata(&ctx, doc.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_document_crud() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Docs").await;

    let doc = app.document(&ctx, folder.id, "b.txt").await;
    app.document(&ctx, folder.id, "a.txt").await;
    app.documents.add_version(&ctx, doc.id, version("h")).await.unwrap();
    app.documents.add_metadata(&ctx, doc.id, "k", "v").await.unwrap();

    let dup = app
        .documents
        .create_document(
            &ctx,
            docvault_service::document::CreateDocumentRequest {
                folder_id: folder.id,
                name: "b.txt".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(dup.is_conflict());

    let listed = app
        .documents
        .list_documents(&ctx, folder.id, PageRequest::default())
        .await
        .unwrap();
    let names: Vec<_> = listed.items.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.txt"]);

    let unclamped = app
        .documents
        .list_documents(
            &ctx,
            folder.id,
            PageRequest {
                page: 0,
                page_size: 0,
            },
        )
        .await
        .unwrap();
    assert_eq!(unclamped.items.len(), 1);
    assert_eq!(unclamped.total_pages, 2);

    let missing = app
        .documents
        .list_documents(&ctx, FolderId::new(), PageRequest::default())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    app.documents.delete_document(&ctx, doc.id).await.unwrap();
    assert!(app.documents.get_document(&ctx, doc.id).await.unwrap_err().is_not_found());
    assert!(app.documents.list_versions(&ctx, doc.id).await.unwrap_err().is_not_found());

    let orphans: i64 = sqlx_count(&app, "SELECT COUNT(*) FROM document_versions").await
        + sqlx_count(&app, "SELECT COUNT(*) FROM document_metadata").await;
    assert_eq!(orphans, 0);
}

async fn sqlx_count(app: &helpers::TestApp, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(app.db.pool())
        .await
        .expect("count query")
}
