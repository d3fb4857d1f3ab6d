use serde::{Deserialize, Serialize};

use crate::{TenantId, UserId};

/// Caller identity asserted by the trusted gateway in front of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: UserId,
    tenant_id: TenantId,
}

impl UserIdentity {
    /// Creates a caller identity for one tenant.
    #[must_use]
    pub fn new(user_id: UserId, tenant_id: TenantId) -> Self {
        Self { user_id, tenant_id }
    }

    /// Returns the calling user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the tenant the caller is acting in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
