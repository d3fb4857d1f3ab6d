use rolegate_domain::{PermissionId, RoleId};

use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .security_admin_service
        .list_roles(&context)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state
        .security_admin_service
        .create_role(&context, payload.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state
        .security_admin_service
        .list_permissions(&context)
        .await?
        .into_iter()
        .map(PermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}

pub async fn create_permission_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = state
        .security_admin_service
        .create_permission(&context, payload.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

pub async fn grant_permission_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path((role_id, permission_id)): Path<(RoleId, PermissionId)>,
) -> ApiResult<Json<RoleGrantResponse>> {
    let grant = state
        .security_admin_service
        .grant_permission_to_role(&context, role_id, permission_id)
        .await?;

    Ok(Json(RoleGrantResponse::from(grant)))
}

pub async fn revoke_permission_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Path((role_id, permission_id)): Path<(RoleId, PermissionId)>,
    Query(query): Query<RevokePermissionQuery>,
) -> ApiResult<Json<RevokeResponse>> {
    let revoked = state
        .security_admin_service
        .revoke_permission_from_role(&context, role_id, permission_id, query.reason)
        .await?;

    Ok(Json(RevokeResponse { revoked }))
}
