//! Tenant scope capability.
//!
//! Every repository method takes a `&TenantScope` instead of a raw
//! [`TenantId`]. The only way to obtain one is [`TenantScope::new`], which
//! rejects a missing (nil) tenant, so a store call that forgets tenant
//! filtering does not type-check.

use std::fmt;

use serde::Serialize;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::id::TenantId;

/// A validated tenant boundary, built once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TenantScope {
    tenant_id: TenantId,
}

impl TenantScope {
    /// Build a scope for `tenant_id`. A nil tenant is a validation error.
    pub fn new(tenant_id: TenantId) -> AppResult<Self> {
        if tenant_id.is_nil() {
            return Err(AppError::validation("Tenant ID is required"));
        }
        Ok(Self { tenant_id })
    }

    /// The tenant every query in this scope is filtered by.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant:{}", self.tenant_id)
    }
}
