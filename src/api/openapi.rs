//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{audit, equipment, filters, health, loans, students};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Equipment Loan API",
        version = "0.1.0",
        description = "School equipment lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Students
        students::list_students,
        students::get_student,
        students::create_student,
        students::update_student,
        students::delete_student,
        // Equipment
        equipment::list_equipment,
        equipment::list_available_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        // Loans
        loans::list_loans,
        loans::checkout,
        loans::list_active_loans,
        loans::list_overdue_loans,
        loans::get_loan,
        loans::return_loan,
        loans::return_with_damage,
        // Audit
        audit::list_audit_logs,
        // Filters
        filters::list_categories,
        filters::list_conditions,
        filters::list_programs,
    ),
    components(
        schemas(
            // Enumerations
            crate::models::enums::EquipmentCondition,
            crate::models::enums::AvailabilityStatus,
            crate::models::enums::StudentStatus,
            crate::models::enums::LoanStatus,
            crate::models::enums::DamageStatus,
            crate::models::enums::AuditAction,
            // Students
            crate::models::student::Student,
            crate::models::student::CreateStudent,
            crate::models::student::UpdateStudent,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            // Loans
            crate::models::loan::LoanView,
            crate::models::loan::DamageAssessment,
            crate::models::loan::CheckoutLoan,
            crate::models::loan::ReturnWithDamage,
            crate::models::loan::ReturnOutcome,
            // Audit
            crate::models::audit::AuditLog,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "students", description = "Student registry"),
        (name = "equipment", description = "Equipment registry"),
        (name = "loans", description = "Checkout, return and overdue tracking"),
        (name = "audit", description = "Audit trail of loan transitions"),
        (name = "filters", description = "Values for search filters")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
