//! Request context carrying the authenticated user, tenant, and role set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docvault_core::TenantScope;
use docvault_core::result::AppResult;
use docvault_core::types::{RoleId, TenantId, UserId};

/// Context for the current authenticated request.
///
/// Built from already-validated claims and passed into every service method
/// so each operation knows who is acting and within which tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: UserId,
    /// The tenant the request is bound to.
    pub tenant_id: TenantId,
    /// Roles held by the user within the tenant.
    pub roles: Vec<RoleId>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(user_id: UserId, tenant_id: TenantId, roles: Vec<RoleId>) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
            request_time: Utc::now(),
        }
    }

    /// The tenant scope for repository calls. Fails when the tenant is missing.
    pub fn scope(&self) -> AppResult<TenantScope> {
        TenantScope::new(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_requires_tenant() {
        let nil_tenant = TenantId::from_uuid(uuid::Uuid::nil());
        let ctx = RequestContext::new(UserId::new(), nil_tenant, vec![]);
        let err = ctx.scope().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_scope_carries_tenant() {
        let tenant_id = TenantId::new();
        let role = RoleId::new();
        let ctx = RequestContext::new(UserId::new(), tenant_id, vec![role]);
        assert_eq!(ctx.scope().unwrap().tenant_id(), tenant_id);
        assert_eq!(ctx.roles, [role]);
    }
}
