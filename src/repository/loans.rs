//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use super::{audit, equipment, students, LoanRepository};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        enums::{AvailabilityStatus, LoanStatus},
        audit::NewAuditEntry,
        loan::{DamageAssessment, Loan, LoanClosure, LoanFilter, NewLoan},
    },
};

#[derive(Debug, FromRow)]
struct LoanRow {
    id: Uuid,
    student_id: Uuid,
    equipment_id: Uuid,
    date_borrowed: NaiveDate,
    date_due: NaiveDate,
    date_returned: Option<NaiveDate>,
    status: String,
    notes: Option<String>,
    damage_status: Option<String>,
    damage_notes: Option<String>,
    days_late: Option<i64>,
    late_fee: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status: LoanStatus = row.status.parse().map_err(|_| {
            AppError::Internal(format!("Loan {} has unknown status '{}'", row.id, row.status))
        })?;
        let damage = match row.damage_status {
            Some(ref label) => Some(DamageAssessment {
                status: label.parse().map_err(|_| {
                    AppError::Internal(format!("Loan {} has unknown damage status '{}'", row.id, label))
                })?,
                notes: row.damage_notes,
            }),
            None => None,
        };

        Ok(Loan {
            id: row.id,
            student_id: row.student_id,
            equipment_id: row.equipment_id,
            date_borrowed: row.date_borrowed,
            date_due: row.date_due,
            date_returned: row.date_returned,
            status,
            notes: row.notes,
            damage,
            days_late: row.days_late,
            late_fee: row.late_fee,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepository for PgLoansRepository {
    /// Get loan by ID
    async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::loan_not_found(id))?
            .try_into()
    }

    /// List loans matching the filter, most recently borrowed first
    async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR equipment_id = $2)
              AND ($3::bool IS NULL OR (status <> 'Returned') = $3)
              AND ($4::date IS NULL OR date_due < $4)
            ORDER BY date_borrowed DESC, created_at DESC
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.equipment_id)
        .bind(filter.open)
        .bind(filter.due_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Loan::try_from).collect()
    }

    /// Borrow equipment: check the student, flip the equipment Available -> Borrowed
    /// and insert the loan in one transaction
    async fn checkout(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        students::lock_active(&mut tx, loan.student_id).await?;

        let availability = equipment::lock_availability(&mut tx, loan.equipment_id).await?;
        if availability != AvailabilityStatus::Available {
            return Err(AppError::Conflict(
                ErrorCode::EquipmentNotAvailable,
                format!("Equipment {} is not available ({})", loan.equipment_id, availability),
            ));
        }

        equipment::set_availability(&mut tx, loan.equipment_id, AvailabilityStatus::Borrowed)
            .await?;

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO loans (id, student_id, equipment_id, date_borrowed, date_due, status, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(loan.student_id)
        .bind(loan.equipment_id)
        .bind(loan.date_borrowed)
        .bind(loan.date_due)
        .bind(LoanStatus::Borrowed.as_str())
        .bind(&loan.notes)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(&mut tx, &NewAuditEntry::checkout(loan)).await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Close the loan and release its equipment in one transaction
    async fn close(&self, closure: &LoanClosure) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let current: Loan =
            sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
                .bind(closure.loan_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::loan_not_found(closure.loan_id))?
                .try_into()?;

        if !current.is_open() {
            return Err(AppError::InvalidState(format!(
                "Loan {} already returned",
                closure.loan_id
            )));
        }

        let availability = equipment::lock_availability(&mut tx, current.equipment_id).await?;
        if availability != AvailabilityStatus::Borrowed {
            tracing::warn!(
                loan_id = %current.id,
                equipment_id = %current.equipment_id,
                "Equipment of an open loan was {} instead of Borrowed",
                availability
            );
        }

        let row = sqlx::query_as::<_, LoanRow>(
            r#"
            UPDATE loans SET
                status = $2,
                date_returned = $3,
                days_late = $4,
                late_fee = $5,
                damage_status = $6,
                damage_notes = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(closure.loan_id)
        .bind(LoanStatus::Returned.as_str())
        .bind(closure.date_returned)
        .bind(closure.days_late)
        .bind(closure.late_fee)
        .bind(closure.damage.as_ref().map(|d| d.status.as_str()))
        .bind(closure.damage.as_ref().and_then(|d| d.notes.clone()))
        .fetch_one(&mut *tx)
        .await?;

        equipment::set_availability(&mut tx, current.equipment_id, closure.release_to).await?;
        if let Some(condition) = closure.new_condition {
            equipment::set_condition(&mut tx, current.equipment_id, condition).await?;
        }

        audit::record(&mut tx, &NewAuditEntry::closure(closure)).await?;

        tx.commit().await?;
        row.try_into()
    }
}
