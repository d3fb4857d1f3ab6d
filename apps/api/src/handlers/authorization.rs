use super::*;

pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Json(payload): Json<AuthorizeRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let request = payload.into_request(context)?;
    let decision = state.authorization_service.authorize(request).await;

    Ok(Json(DecisionResponse::from(decision)))
}

pub async fn effective_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
) -> ApiResult<Json<EffectivePermissionsResponse>> {
    let permissions = state
        .authorization_service
        .list_effective_permissions(&context)
        .await?;

    Ok(Json(EffectivePermissionsResponse::new(&context, permissions)))
}
