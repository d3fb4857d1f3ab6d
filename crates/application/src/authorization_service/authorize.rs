use tracing::{debug, warn};

use chrono::Utc;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{
    ACCESS_DENIED_MESSAGE, AuditEntry, ConflictResolver, Decision, DenialCode, Scope,
};

use super::*;

impl AuthorizationService {
    /// Decides one request. Never fails: every error becomes a fail-closed denial.
    pub async fn authorize(&self, request: AuthorizationRequest) -> Decision {
        let deadline = request.deadline.unwrap_or(self.settings.default_deadline);
        let user_id = request.context.principal.user_id;
        let tenant_id = request.context.tenant.tenant_id;

        let decision = match tokio::time::timeout(deadline, self.evaluate(&request)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(error)) => {
                warn!(
                    %user_id,
                    %tenant_id,
                    permission = %request.permission,
                    denial = %DenialCode::ResolutionFailed,
                    %error,
                    "authorization failed closed"
                );
                Decision::fail_closed(request.permission.clone(), DenialCode::ResolutionFailed)
            }
            Err(_) => {
                warn!(
                    %user_id,
                    %tenant_id,
                    permission = %request.permission,
                    denial = %DenialCode::Timeout,
                    deadline_ms = deadline.as_millis(),
                    "authorization deadline exceeded"
                );
                Decision::fail_closed(request.permission.clone(), DenialCode::Timeout)
            }
        };

        if let Some(denial) = decision.denial() {
            debug!(%user_id, %tenant_id, permission = %request.permission, %denial, "access denied");
        }

        self.record_if_sensitive(&request.context, decision).await
    }

    /// Ensures the caller holds `permission` in the request tenant.
    pub async fn require_permission(
        &self,
        context: &AccessContext,
        permission: PermissionCode,
    ) -> AppResult<Decision> {
        let decision = self
            .authorize(AuthorizationRequest::now(*context, permission))
            .await;

        if decision.allowed() {
            Ok(decision)
        } else {
            Err(AppError::Forbidden(ACCESS_DENIED_MESSAGE.to_owned()))
        }
    }

    /// Ensures the caller holds `permission` through GLOBAL assignments alone.
    ///
    /// Tenant-scoped assignments are left out, whatever the request tenant.
    pub async fn require_global_permission(
        &self,
        context: &AccessContext,
        permission: PermissionCode,
    ) -> AppResult<()> {
        let mut active = self
            .resolver
            .resolve_active(
                &context.principal,
                &context.tenant,
                Utc::now(),
                self.settings.system_default_policy_id,
            )
            .await?;
        active
            .roles
            .retain(|candidate| candidate.assignment.scope() == Scope::Global);

        let sets = self.builder.expand(&active.roles).await?;
        let resolution = ConflictResolver::resolve(&active.selection, sets);
        let decision = Decision::evaluate(permission, &active.selection, resolution);

        if decision.allowed() {
            Ok(())
        } else {
            debug!(
                user_id = %context.principal.user_id,
                permission = %decision.requested(),
                "global permission required"
            );
            Err(AppError::Forbidden(ACCESS_DENIED_MESSAGE.to_owned()))
        }
    }

    /// Returns the full effective permission set at call time.
    pub async fn list_effective_permissions(
        &self,
        context: &AccessContext,
    ) -> AppResult<BTreeSet<PermissionCode>> {
        Ok(self.effective(context, None).await?.resolution.effective)
    }

    async fn evaluate(&self, request: &AuthorizationRequest) -> AppResult<Decision> {
        let effective = self.effective(&request.context, request.as_of).await?;

        Ok(Decision::evaluate(
            request.permission.clone(),
            &effective.selection,
            effective.resolution,
        ))
    }

    async fn record_if_sensitive(&self, context: &AccessContext, decision: Decision) -> Decision {
        if !self.settings.is_sensitive(decision.requested()) {
            return decision;
        }

        let entry = AuditEntry::decision(
            context.principal.user_id,
            context.tenant.tenant_id,
            decision.requested().clone(),
            decision.allowed(),
            Utc::now(),
        );

        match self.stores.audit.append(entry).await {
            Ok(()) => decision,
            Err(error) => {
                warn!(
                    user_id = %context.principal.user_id,
                    permission = %decision.requested(),
                    denial = %DenialCode::AuditUnavailable,
                    %error,
                    "sensitive decision could not be audited"
                );
                decision.into_denial(DenialCode::AuditUnavailable)
            }
        }
    }
}
