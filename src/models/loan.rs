//! Loan model, overdue determination and lifecycle request types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::{AvailabilityStatus, DamageStatus, EquipmentCondition, LoanStatus};

/// Damage recorded when a loan is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DamageAssessment {
    pub status: DamageStatus,
    pub notes: Option<String>,
}

/// Loan record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub student_id: Uuid,
    pub equipment_id: Uuid,
    pub date_borrowed: NaiveDate,
    pub date_due: NaiveDate,
    /// Set exactly when the loan is Returned
    pub date_returned: Option<NaiveDate>,
    pub status: LoanStatus,
    pub notes: Option<String>,
    pub damage: Option<DamageAssessment>,
    /// Days past due at return time
    pub days_late: Option<i64>,
    /// Fee charged at return time
    #[schema(value_type = Option<f64>)]
    #[serde(with = "rust_decimal::serde::float_option")]
    pub late_fee: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Whole days `today` is past `date_due`, never negative
pub fn days_overdue(date_due: NaiveDate, today: NaiveDate) -> i64 {
    (today - date_due).num_days().max(0)
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && today > self.date_due
    }

    /// Derived on every read; closed loans are never overdue
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_open() {
            days_overdue(self.date_due, today)
        } else {
            0
        }
    }

    /// Status as shown to clients: open past-due loans read `Overdue` when
    /// `report_overdue` is set, otherwise the stored open status is `Borrowed`.
    pub fn effective_status(&self, today: NaiveDate, report_overdue: bool) -> LoanStatus {
        if !self.is_open() {
            LoanStatus::Returned
        } else if report_overdue && self.is_overdue(today) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Borrowed
        }
    }

    pub fn view(&self, today: NaiveDate, report_overdue: bool) -> LoanView {
        LoanView {
            id: self.id,
            student_id: self.student_id,
            equipment_id: self.equipment_id,
            date_borrowed: self.date_borrowed,
            date_due: self.date_due,
            date_returned: self.date_returned,
            status: self.effective_status(today, report_overdue),
            is_overdue: self.is_overdue(today),
            days_overdue: self.days_overdue(today),
            notes: self.notes.clone(),
            damage: self.damage.clone(),
            days_late: self.days_late,
            late_fee: self.late_fee,
        }
    }
}

/// Loan as returned by the API, annotated with derived overdue state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub equipment_id: Uuid,
    pub date_borrowed: NaiveDate,
    pub date_due: NaiveDate,
    pub date_returned: Option<NaiveDate>,
    pub status: LoanStatus,
    pub is_overdue: bool,
    pub days_overdue: i64,
    pub notes: Option<String>,
    pub damage: Option<DamageAssessment>,
    pub days_late: Option<i64>,
    #[schema(value_type = Option<f64>)]
    #[serde(with = "rust_decimal::serde::float_option")]
    pub late_fee: Option<Decimal>,
}

/// Checkout request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutLoan {
    pub student_id: Uuid,
    pub equipment_id: Uuid,
    /// ISO-8601 calendar date, strictly after today
    pub date_due: NaiveDate,
    pub notes: Option<String>,
}

/// Return-with-damage request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnWithDamage {
    #[serde(default)]
    pub damage_status: DamageStatus,
    pub damage_notes: Option<String>,
    /// Required; the equipment condition after inspection
    pub new_condition: Option<EquipmentCondition>,
}

/// Result of a return with damage assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReturnOutcome {
    pub days_late: i64,
    #[schema(value_type = f64)]
    #[serde(with = "rust_decimal::serde::float")]
    pub late_fine: Decimal,
    pub loan: LoanView,
}

/// Loan search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub student_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    /// `Overdue` selects open loans past due
    pub status: Option<LoanStatus>,
    #[serde(default)]
    pub overdue_only: bool,
}

/// Store-level loan filter, with dates already resolved against the clock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoanFilter {
    pub student_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    pub open: Option<bool>,
    /// Only loans with `date_due` strictly before this date
    pub due_before: Option<NaiveDate>,
}

impl LoanFilter {
    pub fn open() -> Self {
        Self {
            open: Some(true),
            ..Default::default()
        }
    }

    pub fn overdue(today: NaiveDate) -> Self {
        Self {
            open: Some(true),
            due_before: Some(today),
            ..Default::default()
        }
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        if self.student_id.is_some_and(|id| id != loan.student_id) {
            return false;
        }
        if self.equipment_id.is_some_and(|id| id != loan.equipment_id) {
            return false;
        }
        if self.open.is_some_and(|open| open != loan.is_open()) {
            return false;
        }
        if self.due_before.is_some_and(|d| loan.date_due >= d) {
            return false;
        }
        true
    }
}

/// A loan ready to be persisted by checkout
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub id: Uuid,
    pub student_id: Uuid,
    pub equipment_id: Uuid,
    pub date_borrowed: NaiveDate,
    pub date_due: NaiveDate,
    pub notes: Option<String>,
}

/// Everything the store writes when it closes a loan
#[derive(Debug, Clone)]
pub struct LoanClosure {
    pub loan_id: Uuid,
    pub date_returned: NaiveDate,
    pub days_late: i64,
    pub late_fee: Decimal,
    pub damage: Option<DamageAssessment>,
    /// Availability the equipment is released to
    pub release_to: AvailabilityStatus,
    pub new_condition: Option<EquipmentCondition>,
}
