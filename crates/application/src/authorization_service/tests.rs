use std::sync::Arc;

use pinegate_core::{AdminIdentity, AppError};
use pinegate_domain::{Permission, UserId};

use crate::test_support::FakeAdminPermissionRepository;

use super::AuthorizationService;

#[tokio::test]
async fn require_permission_allows_granted_admin() {
    let admin = UserId::new();
    let service = AuthorizationService::new(Arc::new(FakeAdminPermissionRepository::granting(
        admin,
        vec![Permission::IndicatorAccessBulkManage],
    )));

    let result = service
        .require_permission(
            &AdminIdentity::new(admin.as_uuid()),
            Permission::IndicatorAccessBulkManage,
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn require_permission_rejects_missing_grant_as_unauthorized() {
    let admin = UserId::new();
    let service = AuthorizationService::new(Arc::new(FakeAdminPermissionRepository::granting(
        admin,
        vec![Permission::IndicatorAccessRead],
    )));

    let result = service
        .require_permission(
            &AdminIdentity::new(admin.as_uuid()),
            Permission::IndicatorAccessBulkManage,
        )
        .await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn has_permission_is_false_for_unknown_admin() {
    let service =
        AuthorizationService::new(Arc::new(FakeAdminPermissionRepository::default()));

    let result = service
        .has_permission(
            &AdminIdentity::new(UserId::new().as_uuid()),
            Permission::IndicatorAccessRead,
        )
        .await;

    assert_eq!(result.ok(), Some(false));
}
