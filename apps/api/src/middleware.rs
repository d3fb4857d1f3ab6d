use std::str::FromStr;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use rolegate_application::AccessContext;
use rolegate_core::{AppError, AppResult, TenantId, UserId, UserIdentity};
use rolegate_domain::PolicyId;

use crate::error::ApiResult;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const PRINCIPAL_POLICY_HEADER: &str = "x-principal-policy-id";
pub const TENANT_POLICY_HEADER: &str = "x-tenant-policy-id";

/// Reads the identity asserted by the gateway and exposes it as an [`AccessContext`].
pub async fn require_identity(mut request: Request, next: Next) -> ApiResult<Response> {
    let context = access_context_from_headers(request.headers())?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

pub fn access_context_from_headers(headers: &HeaderMap) -> AppResult<AccessContext> {
    let identity = UserIdentity::new(
        UserId::from_uuid(required_uuid(headers, USER_ID_HEADER)?),
        TenantId::from_uuid(required_uuid(headers, TENANT_ID_HEADER)?),
    );

    let mut context = AccessContext::from_identity(&identity);
    context.principal.default_policy_id = optional_policy(headers, PRINCIPAL_POLICY_HEADER)?;
    context.tenant.default_policy_id = optional_policy(headers, TENANT_POLICY_HEADER)?;
    Ok(context)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::Unauthorized(format!("{name} header is not valid text")))
        })
        .transpose()
        .map(|value| value.filter(|value| !value.is_empty()))
}

fn required_uuid(headers: &HeaderMap, name: &str) -> AppResult<uuid::Uuid> {
    let value = header_value(headers, name)?
        .ok_or_else(|| AppError::Unauthorized(format!("{name} header is required")))?;
    uuid::Uuid::parse_str(value)
        .map_err(|_| AppError::Unauthorized(format!("{name} header must be a UUID")))
}

fn optional_policy(headers: &HeaderMap, name: &str) -> AppResult<Option<PolicyId>> {
    header_value(headers, name)?
        .map(|value| {
            PolicyId::from_str(value)
                .map_err(|_| AppError::Validation(format!("{name} header must be a UUID")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(values: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in values {
            let Ok(value) = HeaderValue::from_str(value) else {
                panic!("invalid test header value");
            };
            headers.insert(*name, value);
        }
        headers
    }

    #[test]
    fn identity_headers_build_the_access_context() {
        let user_id = uuid::Uuid::new_v4();
        let tenant_id = uuid::Uuid::new_v4();
        let policy_id = uuid::Uuid::new_v4();
        let (user, tenant, policy) = (
            user_id.to_string(),
            tenant_id.to_string(),
            policy_id.to_string(),
        );

        let context = access_context_from_headers(&headers(&[
            (USER_ID_HEADER, user.as_str()),
            (TENANT_ID_HEADER, tenant.as_str()),
            (TENANT_POLICY_HEADER, policy.as_str()),
        ]));

        let Ok(context) = context else {
            panic!("expected a context");
        };
        assert_eq!(context.principal.user_id, UserId::from_uuid(user_id));
        assert_eq!(context.principal.default_policy_id, None);
        assert_eq!(context.tenant.tenant_id, TenantId::from_uuid(tenant_id));
        assert_eq!(
            context.tenant.default_policy_id,
            Some(PolicyId::from_uuid(policy_id))
        );
    }

    #[test]
    fn missing_or_malformed_identity_is_unauthorized() {
        let tenant = uuid::Uuid::new_v4().to_string();

        let missing = access_context_from_headers(&headers(&[(TENANT_ID_HEADER, tenant.as_str())]));
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let malformed = access_context_from_headers(&headers(&[
            (USER_ID_HEADER, "alice"),
            (TENANT_ID_HEADER, tenant.as_str()),
        ]));
        assert!(matches!(malformed, Err(AppError::Unauthorized(_))));
    }
}
