use super::*;

pub async fn list_audit_entries_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AccessContext>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .security_admin_service
        .list_audit_entries(&context, params.into_query()?)
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
