use super::*;

pub async fn list_policies_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<Vec<ConflictPolicyResponse>>> {
    let policies = state
        .security_admin_service
        .list_policies(&context)
        .await?
        .into_iter()
        .map(ConflictPolicyResponse::from)
        .collect();

    Ok(Json(policies))
}

pub async fn save_policy_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<SaveConflictPolicyRequest>,
) -> ApiResult<Json<ConflictPolicyResponse>> {
    let (policy_id, input) = payload.into_parts()?;
    let policy = state
        .security_admin_service
        .save_conflict_policy(&context, policy_id, input)
        .await?;

    Ok(Json(ConflictPolicyResponse::from(policy)))
}
