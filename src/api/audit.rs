//! Audit trail endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, models::audit::AuditLog, AppState};

/// Most recent audit entries, newest first (at most 100)
#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "audit",
    responses(
        (status = 200, description = "Recent audit entries", body = Vec<AuditLog>)
    )
)]
pub async fn list_audit_logs(State(state): State<AppState>) -> AppResult<Json<Vec<AuditLog>>> {
    let logs = state.services.audit.recent().await?;
    Ok(Json(logs))
}
