//! Audit trail entries for loan transitions

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    enums::AuditAction,
    loan::{LoanClosure, NewLoan},
};

/// Stored audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Uuid,
    #[schema(value_type = Object)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// Entry written by the store in the same atomic unit as the change it describes
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub table_name: &'static str,
    pub record_id: Uuid,
    pub details: Value,
}

impl NewAuditEntry {
    pub fn checkout(loan: &NewLoan) -> Self {
        Self {
            action: AuditAction::Create,
            table_name: "loans",
            record_id: loan.id,
            details: json!({
                "student_id": loan.student_id,
                "equipment_id": loan.equipment_id,
                "date_borrowed": loan.date_borrowed,
                "date_due": loan.date_due,
            }),
        }
    }

    pub fn closure(closure: &LoanClosure) -> Self {
        let details = match closure.damage {
            Some(ref damage) => json!({
                "action": "return_with_damage",
                "date_returned": closure.date_returned,
                "damage_status": damage.status.as_str(),
                "damage_notes": damage.notes,
                "new_condition": closure.new_condition.map(|c| c.as_str()),
                "released_to": closure.release_to.as_str(),
                "days_late": closure.days_late,
                "late_fine": closure.late_fee.to_f64(),
            }),
            None => json!({
                "action": "return",
                "date_returned": closure.date_returned,
                "released_to": closure.release_to.as_str(),
                "days_late": closure.days_late,
                "late_fine": closure.late_fee.to_f64(),
            }),
        };

        Self {
            action: AuditAction::Update,
            table_name: "loans",
            record_id: closure.loan_id,
            details,
        }
    }

    pub fn into_log(self, created_at: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            action: self.action,
            table_name: self.table_name.to_string(),
            record_id: self.record_id,
            details: self.details,
            created_at,
        }
    }
}
