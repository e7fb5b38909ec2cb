//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{CheckoutLoan, LoanQuery, LoanView, ReturnOutcome, ReturnWithDamage},
    AppState,
};

/// List loans, most recently borrowed first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Matching loans", body = Vec<LoanView>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state.services.loans.list(&query).await?;
    Ok(Json(loans))
}

/// Check equipment out to a student
#[utoipa::path(
    post,
    path = "/loans/checkout",
    tag = "loans",
    request_body = CheckoutLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanView),
        (status = 400, description = "Due date not after today", body = crate::error::ErrorResponse),
        (status = 404, description = "Student or equipment not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Equipment not available or student inactive", body = crate::error::ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutLoan>,
) -> AppResult<(StatusCode, Json<LoanView>)> {
    let loan = state.services.loans.checkout(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List open loans
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    responses(
        (status = 200, description = "Open loans", body = Vec<LoanView>)
    )
)]
pub async fn list_active_loans(State(state): State<AppState>) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state.services.loans.list_active().await?;
    Ok(Json(loans))
}

/// List open loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans with days overdue", body = Vec<LoanView>)
    )
)]
pub async fn list_overdue_loans(State(state): State<AppState>) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state.services.loans.list_overdue().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanView),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanView>> {
    let loan = state.services.loans.get(id).await?;
    Ok(Json(loan))
}

/// Return borrowed equipment without inspection
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Equipment returned", body = LoanView),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanView>> {
    let loan = state.services.loans.return_loan(id).await?;
    Ok(Json(loan))
}

/// Return borrowed equipment with a damage assessment and late fine
#[utoipa::path(
    post,
    path = "/loans/{id}/return-with-damage",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    request_body = ReturnWithDamage,
    responses(
        (status = 200, description = "Equipment returned and assessed", body = ReturnOutcome),
        (status = 400, description = "New condition missing", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_with_damage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReturnWithDamage>,
) -> AppResult<Json<ReturnOutcome>> {
    let outcome = state.services.loans.return_with_damage(id, request).await?;
    Ok(Json(outcome))
}
