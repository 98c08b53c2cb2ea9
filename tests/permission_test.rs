//! Integration tests for grants, inheritance, and propagation.

mod helpers;

use uuid::Uuid;

use docvault_core::types::{PageRequest, PermissionId, RoleId};
use docvault_entity::folder::Folder;
use docvault_entity::permission::{PermissionType, ResourceType, UpdatePermission};
use docvault_service::folder::MoveFolderRequest;
use docvault_service::permission::{CreatePermissionRequest, GrantSource};
use docvault_service::RequestContext;

fn grant(
    role_id: RoleId,
    folder: &Folder,
    permission_type: PermissionType,
) -> CreatePermissionRequest {
    CreatePermissionRequest {
        role_id,
        resource_type: ResourceType::Folder,
        resource_id: folder.id.into_uuid(),
        permission_type,
    }
}

async fn check(
    app: &helpers::TestApp,
    ctx: &RequestContext,
    role_id: RoleId,
    folder: &Folder,
    permission_type: PermissionType,
) -> bool {
    app.permissions
        .check_permission(
            ctx,
            role_id,
            ResourceType::Folder,
            folder.id.into_uuid(),
            permission_type,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_direct_and_admin_grants() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let reader = RoleId::new();
    let admin = RoleId::new();

    let docs = app.folder(&ctx, None, "Docs").await;
    app.permissions
        .create_permission(&ctx, grant(reader, &docs, PermissionType::Read))
        .await
        .unwrap();
    app.permissions
        .create_permission(&ctx, grant(admin, &docs, PermissionType::Admin))
        .await
        .unwrap();

    assert!(check(&app, &ctx, reader, &docs, PermissionType::Read).await);
    assert!(!check(&app, &ctx, reader, &docs, PermissionType::Write).await);
    for permission_type in PermissionType::ALL {
        assert!(check(&app, &ctx, admin, &docs, permission_type).await);
    }
    assert!(!check(&app, &ctx, RoleId::new(), &docs, PermissionType::Read).await);
}

#[tokio::test]
async fn test_write_inherited_from_parent() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    app.permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Write))
        .await
        .unwrap();

    assert!(check(&app, &ctx, role, &year, PermissionType::Write).await);
    assert!(!check(&app, &ctx, role, &year, PermissionType::Delete).await);
    assert!(!check(&app, &ctx, role, &projects, PermissionType::Read).await);
}

#[tokio::test]
async fn test_admin_on_any_ancestor_grants_write() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let root = app.folder(&ctx, None, "Root").await;
    let mid = app.folder(&ctx, Some(&root), "Mid").await;
    let leaf = app.folder(&ctx, Some(&mid), "Leaf").await;
    app.permissions
        .create_permission(&ctx, grant(role, &root, PermissionType::Admin))
        .await
        .unwrap();

    for folder in [&root, &mid, &leaf] {
        assert!(check(&app, &ctx, role, folder, PermissionType::Write).await);
    }

    let ctx = RequestContext::new(ctx.user_id, ctx.tenant_id, vec![RoleId::new(), role]);
    let decision = app
        .permissions
        .authorize(
            &ctx,
            ResourceType::Folder,
            leaf.id.into_uuid(),
            PermissionType::ManageFolders,
        )
        .await
        .unwrap();
    assert_eq!(decision.source, GrantSource::Ancestor { folder_id: root.id });
}

#[tokio::test]
async fn test_authorize_without_any_role_grant_fails() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let folder = app.folder(&ctx, None, "Private").await;

    let err = app
        .permissions
        .authorize(&ctx, ResourceType::Folder, folder.id.into_uuid(), PermissionType::Read)
        .await
        .unwrap_err();
    assert_eq!(err.kind, docvault_core::error::ErrorKind::Authorization);
}

#[tokio::test]
async fn test_inherited_permissions_are_tagged() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    let q1 = app.folder(&ctx, Some(&year), "Q1").await;
    app.permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Read))
        .await
        .unwrap();
    app.permissions
        .create_permission(&ctx, grant(role, &year, PermissionType::Write))
        .await
        .unwrap();

    let inherited = app
        .permissions
        .get_inherited_permissions(&ctx, q1.id)
        .await
        .unwrap();
    assert_eq!(inherited.len(), 2);
    assert!(inherited.iter().all(|p| p.inherited));
    // Nearest ancestor first.
    assert_eq!(inherited[0].resource_id, year.id.into_uuid());
    assert_eq!(inherited[1].resource_id, projects.id.into_uuid());

    let stored = app
        .permissions
        .list_for_resource(&ctx, ResourceType::Folder, year.id.into_uuid())
        .await
        .unwrap();
    assert!(stored.iter().all(|p| !p.inherited));

    assert!(
        app.permissions
            .get_inherited_permissions(&ctx, projects.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_propagation_is_idempotent() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    let q1 = app.folder(&ctx, Some(&year), "Q1").await;
    let source = app
        .permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Write))
        .await
        .unwrap();

    let first = app
        .permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|p| p.inherited && p.source_permission_id == Some(source.id)));

    let second = app
        .permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();
    assert!(second.is_empty());

    for folder in [&year, &q1] {
        let grants = app
            .permissions
            .list_for_resource(&ctx, ResourceType::Folder, folder.id.into_uuid())
            .await
            .unwrap();
        assert_eq!(grants.len(), 1);
    }
}

#[tokio::test]
async fn test_revocation_removes_propagated_copies() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    let source = app
        .permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Write))
        .await
        .unwrap();
    app.permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();

    app.permissions
        .delete_permission(&ctx, source.id)
        .await
        .unwrap();

    let copies = app
        .permissions
        .list_for_resource(&ctx, ResourceType::Folder, year.id.into_uuid())
        .await
        .unwrap();
    assert!(copies.is_empty());
    assert!(!check(&app, &ctx, role, &year, PermissionType::Write).await);
}

#[tokio::test]
async fn test_update_invalidates_copies() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    let source = app
        .permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Admin))
        .await
        .unwrap();
    app.permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();

    let updated = app
        .permissions
        .update_permission(
            &ctx,
            source.id,
            UpdatePermission {
                role_id: None,
                permission_type: Some(PermissionType::Read),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.permission_type, PermissionType::Read);

    let copies = app
        .permissions
        .list_for_resource(&ctx, ResourceType::Folder, year.id.into_uuid())
        .await
        .unwrap();
    assert!(copies.is_empty());
    assert!(check(&app, &ctx, role, &year, PermissionType::Read).await);
    assert!(!check(&app, &ctx, role, &year, PermissionType::Write).await);

    let err = app
        .permissions
        .update_permission(&ctx, source.id, UpdatePermission::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_move_drops_copies_from_old_ancestors() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let archive = app.folder(&ctx, None, "Archive").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    let q1 = app.folder(&ctx, Some(&year), "Q1").await;

    app.permissions
        .create_permission(&ctx, grant(role, &projects, PermissionType::Write))
        .await
        .unwrap();
    let own = app
        .permissions
        .create_permission(&ctx, grant(role, &year, PermissionType::Read))
        .await
        .unwrap();
    app.permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();
    app.permissions
        .propagate_permissions(&ctx, year.id)
        .await
        .unwrap();

    app.folders
        .move_folder(
            &ctx,
            year.id,
            MoveFolderRequest {
                new_parent_id: Some(archive.id),
            },
        )
        .await
        .unwrap();

    let on_year = app
        .permissions
        .list_for_resource(&ctx, ResourceType::Folder, year.id.into_uuid())
        .await
        .unwrap();
    assert_eq!(on_year.len(), 1);
    assert_eq!(on_year[0].id, own.id);

    let on_q1 = app
        .permissions
        .list_for_resource(&ctx, ResourceType::Folder, q1.id.into_uuid())
        .await
        .unwrap();
    assert_eq!(on_q1.len(), 1);
    assert_eq!(on_q1[0].source_permission_id, Some(own.id));

    assert!(!check(&app, &ctx, role, &q1, PermissionType::Write).await);
    assert!(check(&app, &ctx, role, &q1, PermissionType::Read).await);
}

#[tokio::test]
async fn test_grant_crud_and_validation() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();
    let folder = app.folder(&ctx, None, "Shared").await;

    let created = app
        .permissions
        .create_permission(&ctx, grant(role, &folder, PermissionType::Read))
        .await
        .unwrap();
    assert!(created.is_direct());
    assert_eq!(created.created_by, ctx.user_id);

    let fetched = app.permissions.get_permission(&ctx, created.id).await.unwrap();
    assert_eq!(fetched, created);

    let err = app
        .permissions
        .create_permission(&ctx, grant(role, &folder, PermissionType::Read))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = app
        .permissions
        .create_permission(
            &ctx,
            CreatePermissionRequest {
                role_id: role,
                resource_type: ResourceType::Folder,
                resource_id: Uuid::new_v4(),
                permission_type: PermissionType::Read,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = app
        .permissions
        .create_permission(
            &ctx,
            CreatePermissionRequest {
                role_id: role,
                resource_type: ResourceType::Folder,
                resource_id: Uuid::nil(),
                permission_type: PermissionType::Read,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert!(
        app.permissions
            .get_permission(&ctx, PermissionId::new())
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        app.permissions
            .delete_permission(&ctx, PermissionId::new())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_bulk_create_is_atomic() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let role = RoleId::new();
    let a = app.folder(&ctx, None, "A").await;
    let b = app.folder(&ctx, None, "B").await;

    let err = app
        .permissions
        .create_bulk(
            &ctx,
            vec![
                grant(role, &a, PermissionType::Read),
                grant(role, &b, PermissionType::Read),
                grant(role, &a, PermissionType::Read),
            ],
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(app.permissions.list_for_role(&ctx, role).await.unwrap().is_empty());

    let created = app
        .permissions
        .create_bulk(
            &ctx,
            vec![
                grant(role, &a, PermissionType::Read),
                grant(role, &b, PermissionType::Write),
            ],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let page = app
        .permissions
        .list_for_tenant(&ctx, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 2);
}

#[tokio::test]
async fn test_delete_by_resource_and_role() {
    let app = helpers::TestApp::new().await;
    let ctx = app.tenant_ctx();
    let reader = RoleId::new();
    let writer = RoleId::new();

    let projects = app.folder(&ctx, None, "Projects").await;
    let year = app.folder(&ctx, Some(&projects), "2024").await;
    app.permissions
        .create_bulk(
            &ctx,
            vec![
                grant(reader, &projects, PermissionType::Read),
                grant(writer, &projects, PermissionType::Write),
                grant(writer, &year, PermissionType::Delete),
            ],
        )
        .await
        .unwrap();
    app.permissions
        .propagate_permissions(&ctx, projects.id)
        .await
        .unwrap();

    // Two direct grants on Projects plus their two copies on 2024.
    let deleted = app
        .permissions
        .delete_by_resource(&ctx, ResourceType::Folder, projects.id.into_uuid())
        .await
        .unwrap();
    assert_eq!(deleted, 4);

    let remaining = app.permissions.list_for_role(&ctx, writer).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].permission_type, PermissionType::Delete);

    assert_eq!(app.permissions.delete_by_role(&ctx, writer).await.unwrap(), 1);
    assert!(app.permissions.list_for_role(&ctx, reader).await.unwrap().is_empty());
}
