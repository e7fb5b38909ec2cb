//! Filter value endpoints for search forms

use axum::{extract::State, Json};

use crate::{error::AppResult, models::enums::EquipmentCondition, AppState};

/// Distinct equipment categories
#[utoipa::path(
    get,
    path = "/filters/categories",
    tag = "filters",
    responses(
        (status = 200, description = "Categories in use", body = Vec<String>)
    )
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.services.equipment.list_categories().await?))
}

/// Equipment condition labels
#[utoipa::path(
    get,
    path = "/filters/conditions",
    tag = "filters",
    responses(
        (status = 200, description = "Condition labels, best first", body = Vec<EquipmentCondition>)
    )
)]
pub async fn list_conditions(State(state): State<AppState>) -> Json<Vec<EquipmentCondition>> {
    Json(state.services.equipment.conditions())
}

/// Distinct student programs
#[utoipa::path(
    get,
    path = "/filters/programs",
    tag = "filters",
    responses(
        (status = 200, description = "Programs in use", body = Vec<String>)
    )
)]
pub async fn list_programs(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.services.students.list_programs().await?))
}
