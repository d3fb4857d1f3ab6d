use super::*;

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let input = payload.into_input(context.principal.user_id)?;
    let assignment_id = state
        .security_admin_service
        .assign_role(&context, input)
        .await?;

    Ok(Json(AssignmentResponse::from(assignment_id)))
}

pub async fn revoke_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<RevokeRoleRequest>,
) -> ApiResult<Json<RevokeResponse>> {
    let (user_id, role_id) = payload.parse_ids()?;
    let revoked = state
        .security_admin_service
        .revoke_role(&context, user_id, role_id, payload.reason.as_str())
        .await?;

    Ok(Json(RevokeResponse { revoked }))
}
