//! Loan lifecycle service
//!
//! A loan is created `Borrowed` by checkout, is overdue (derived, never
//! stored) while open past its due date, and is closed `Returned` by either
//! return operation. Each transition and its equipment side effect are
//! committed atomically by the loan store.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::clock::Clock;
use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        enums::{AvailabilityStatus, EquipmentCondition, LoanStatus},
        loan::{
            days_overdue, CheckoutLoan, DamageAssessment, Loan, LoanClosure, LoanFilter,
            LoanQuery, LoanView, NewLoan, ReturnOutcome, ReturnWithDamage,
        },
    },
    repository::Repository,
};

/// Fee and reporting rules applied by the lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct LoanPolicy {
    pub rate_per_day: Decimal,
    pub report_overdue_status: bool,
}

impl LoanPolicy {
    pub fn late_fee(&self, days_late: i64) -> Decimal {
        Decimal::from(days_late.max(0)) * self.rate_per_day
    }
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self {
            rate_per_day: config.rate_per_day,
            report_overdue_status: config.report_overdue_status,
        }
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        (&LoansConfig::default()).into()
    }
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, policy: LoanPolicy) -> Self {
        Self {
            repository,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// Lend equipment to a student until `date_due`. The store re-reads the
    /// student and the equipment under one lock before writing the loan.
    pub async fn checkout(&self, request: CheckoutLoan) -> AppResult<LoanView> {
        let today = self.clock.today();

        if request.date_due <= today {
            return Err(AppError::Validation(format!(
                "Due date {} must be after today ({})",
                request.date_due, today
            )));
        }

        let loan = self
            .repository
            .loans
            .checkout(&NewLoan {
                id: Uuid::new_v4(),
                student_id: request.student_id,
                equipment_id: request.equipment_id,
                date_borrowed: today,
                date_due: request.date_due,
                notes: request.notes,
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    student_id = %request.student_id,
                    equipment_id = %request.equipment_id,
                    "Checkout refused: {}",
                    e
                )
            })?;

        tracing::info!(
            loan_id = %loan.id,
            student_id = %loan.student_id,
            equipment_id = %loan.equipment_id,
            date_due = %loan.date_due,
            "Equipment checked out"
        );

        Ok(loan.view(today, self.policy.report_overdue_status))
    }

    /// Close a loan without inspection; the equipment becomes Available
    pub async fn return_loan(&self, loan_id: Uuid) -> AppResult<LoanView> {
        let today = self.clock.today();
        let closure = self.closure(loan_id, today, None, None).await?;
        let loan = self.repository.loans.close(&closure).await?;

        tracing::info!(
            loan_id = %loan.id,
            equipment_id = %loan.equipment_id,
            days_late = closure.days_late,
            late_fee = %closure.late_fee,
            "Equipment returned"
        );

        Ok(loan.view(today, self.policy.report_overdue_status))
    }

    /// Close a loan with a damage assessment; damaged equipment is withdrawn
    pub async fn return_with_damage(
        &self,
        loan_id: Uuid,
        request: ReturnWithDamage,
    ) -> AppResult<ReturnOutcome> {
        let new_condition = request.new_condition.ok_or_else(|| {
            AppError::Validation("New equipment condition is required".to_string())
        })?;

        let today = self.clock.today();
        let assessment = DamageAssessment {
            status: request.damage_status,
            notes: request.damage_notes.filter(|n| !n.trim().is_empty()),
        };
        let closure = self
            .closure(loan_id, today, Some(assessment), Some(new_condition))
            .await?;
        let loan = self.repository.loans.close(&closure).await?;

        tracing::info!(
            loan_id = %loan.id,
            equipment_id = %loan.equipment_id,
            damage_status = %request.damage_status,
            new_condition = %new_condition,
            released_to = %closure.release_to,
            days_late = closure.days_late,
            late_fee = %closure.late_fee,
            "Equipment returned with assessment"
        );

        Ok(ReturnOutcome {
            days_late: closure.days_late,
            late_fine: closure.late_fee,
            loan: loan.view(today, self.policy.report_overdue_status),
        })
    }

    /// Open loans past due, each annotated with days overdue as of today
    pub async fn list_overdue(&self) -> AppResult<Vec<LoanView>> {
        let today = self.clock.today();
        let loans = self.repository.loans.list(&LoanFilter::overdue(today)).await?;
        Ok(self.views(loans, today))
    }

    pub async fn list_active(&self) -> AppResult<Vec<LoanView>> {
        let today = self.clock.today();
        let loans = self.repository.loans.list(&LoanFilter::open()).await?;
        Ok(self.views(loans, today))
    }

    pub async fn list(&self, query: &LoanQuery) -> AppResult<Vec<LoanView>> {
        let today = self.clock.today();
        let mut filter = LoanFilter {
            student_id: query.student_id,
            equipment_id: query.equipment_id,
            ..Default::default()
        };
        match query.status {
            Some(LoanStatus::Returned) => filter.open = Some(false),
            Some(LoanStatus::Borrowed) => filter.open = Some(true),
            Some(LoanStatus::Overdue) => {
                filter.open = Some(true);
                filter.due_before = Some(today);
            }
            None => {}
        }
        if query.overdue_only {
            filter.open = Some(true);
            filter.due_before = Some(today);
        }

        let loans = self.repository.loans.list(&filter).await?;
        Ok(self.views(loans, today))
    }

    pub async fn get(&self, loan_id: Uuid) -> AppResult<LoanView> {
        let today = self.clock.today();
        let loan = self.repository.loans.get_by_id(loan_id).await?;
        Ok(loan.view(today, self.policy.report_overdue_status))
    }

    fn views(&self, loans: Vec<Loan>, today: NaiveDate) -> Vec<LoanView> {
        loans
            .iter()
            .map(|l| l.view(today, self.policy.report_overdue_status))
            .collect()
    }

    /// Resolve the loan and compute what closing it today writes. The store
    /// re-checks that the loan is still open under its lock.
    async fn closure(
        &self,
        loan_id: Uuid,
        today: NaiveDate,
        damage: Option<DamageAssessment>,
        new_condition: Option<EquipmentCondition>,
    ) -> AppResult<LoanClosure> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;
        if !loan.is_open() {
            tracing::warn!(loan_id = %loan_id, "Return refused: loan already returned");
            return Err(AppError::InvalidState(format!(
                "Loan {} already returned",
                loan_id
            )));
        }

        let days_late = days_overdue(loan.date_due, today);
        let release_to = match damage {
            Some(ref d) if d.status.is_damaged() => AvailabilityStatus::Damaged,
            _ => AvailabilityStatus::Available,
        };

        Ok(LoanClosure {
            loan_id,
            date_returned: today,
            days_late,
            late_fee: self.policy.late_fee(days_late),
            damage,
            release_to,
            new_condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorCode,
        models::{
            enums::{AuditAction, DamageStatus},
            equipment::{CreateEquipment, Equipment, UpdateEquipment},
            student::{CreateStudent, Student, UpdateStudent},
            StudentStatus,
        },
        services::clock::{ManualClock, MockClock},
    };
    use chrono::Duration;

    fn t0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    struct Fixture {
        service: LoansService,
        repository: Repository,
        clock: Arc<ManualClock>,
        student: Student,
        equipment: Equipment,
    }

    async fn fixture_with(policy: LoanPolicy) -> Fixture {
        let repository = Repository::in_memory();
        let clock = Arc::new(ManualClock::new(t0()));
        let student = repository
            .students
            .create(&CreateStudent {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@school.edu".into(),
                program: Some("Computer Science".into()),
                year_level: Some(2),
                status: None,
            })
            .await
            .unwrap();
        let equipment = repository
            .equipment
            .create(&CreateEquipment {
                name: "Dell Laptop".into(),
                model: Some("Latitude 5440".into()),
                category: Some("Laptop".into()),
                serial_number: Some("DL-0001".into()),
                condition: Some(EquipmentCondition::Excellent),
                availability_status: None,
            })
            .await
            .unwrap();
        let service = LoansService::new(repository.clone(), clock.clone(), policy);
        Fixture {
            service,
            repository,
            clock,
            student,
            equipment,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(LoanPolicy::default()).await
    }

    fn checkout_request(f: &Fixture, due_in_days: i64) -> CheckoutLoan {
        CheckoutLoan {
            student_id: f.student.id,
            equipment_id: f.equipment.id,
            date_due: t0() + Duration::days(due_in_days),
            notes: None,
        }
    }

    async fn availability(f: &Fixture) -> AvailabilityStatus {
        f.repository
            .equipment
            .get_by_id(f.equipment.id)
            .await
            .unwrap()
            .availability_status
    }

    #[tokio::test]
    async fn test_late_return_without_damage() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Borrowed);
        assert_eq!(loan.date_borrowed, t0());
        assert_eq!(availability(&f).await, AvailabilityStatus::Borrowed);

        f.clock.advance_days(10);
        let outcome = f
            .service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::None,
                    damage_notes: None,
                    new_condition: Some(EquipmentCondition::Good),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.days_late, 3);
        assert_eq!(outcome.late_fine, Decimal::new(1500, 2));
        assert_eq!(outcome.loan.status, LoanStatus::Returned);
        assert_eq!(outcome.loan.date_returned, Some(t0() + Duration::days(10)));

        let equipment = f.repository.equipment.get_by_id(f.equipment.id).await.unwrap();
        assert_eq!(equipment.availability_status, AvailabilityStatus::Available);
        assert_eq!(equipment.condition, EquipmentCondition::Good);
    }

    #[tokio::test]
    async fn test_early_return_with_major_damage() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        f.clock.advance_days(2);
        let outcome = f
            .service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::Major,
                    damage_notes: Some("cracked screen".into()),
                    new_condition: Some(EquipmentCondition::Poor),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.days_late, 0);
        assert_eq!(outcome.late_fine, Decimal::ZERO);
        assert_eq!(
            outcome.loan.damage,
            Some(DamageAssessment {
                status: DamageStatus::Major,
                notes: Some("cracked screen".into()),
            })
        );

        let equipment = f.repository.equipment.get_by_id(f.equipment.id).await.unwrap();
        assert_eq!(equipment.availability_status, AvailabilityStatus::Damaged);
        assert_eq!(equipment.condition, EquipmentCondition::Poor);

        let stored = f.repository.loans.get_by_id(loan.id).await.unwrap();
        assert_eq!(stored.damage.unwrap().status, DamageStatus::Major);
    }

    #[tokio::test]
    async fn test_checkout_conflicts_when_equipment_borrowed() {
        let f = fixture().await;
        f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        let err = f.service.checkout(checkout_request(&f, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(..)), "got {:?}", err);

        let loans = f.repository.loans.list(&LoanFilter::default()).await.unwrap();
        assert_eq!(loans.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_conflicts_when_equipment_damaged() {
        let f = fixture().await;
        f.repository
            .equipment
            .update(
                f.equipment.id,
                &UpdateEquipment {
                    availability_status: Some(AvailabilityStatus::Damaged),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f.service.checkout(checkout_request(&f, 7)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(..)));
        assert_eq!(availability(&f).await, AvailabilityStatus::Damaged);
        assert!(f.service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rejects_due_date_not_after_today() {
        let f = fixture().await;
        for days in [0, -1] {
            let err = f.service.checkout(checkout_request(&f, days)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
        }
        assert_eq!(availability(&f).await, AvailabilityStatus::Available);
        assert!(f.service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_unknown_ids() {
        let f = fixture().await;

        let mut request = checkout_request(&f, 7);
        request.student_id = Uuid::new_v4();
        let err = f.service.checkout(request).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ErrorCode::NoSuchStudent, _)));

        let mut request = checkout_request(&f, 7);
        request.equipment_id = Uuid::new_v4();
        let err = f.service.checkout(request).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ErrorCode::NoSuchEquipment, _)));

        assert!(f.service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_refuses_inactive_student() {
        let f = fixture().await;
        f.repository
            .students
            .update(
                f.student.id,
                &UpdateStudent {
                    status: Some(StudentStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f.service.checkout(checkout_request(&f, 7)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ErrorCode::StudentInactive, _)));
        assert_eq!(availability(&f).await, AvailabilityStatus::Available);
    }

    #[tokio::test]
    async fn test_second_return_fails_without_equipment_mutation() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();
        let returned = f.service.return_loan(loan.id).await.unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert_eq!(returned.late_fee, Some(Decimal::ZERO));

        // staff reserve the item again; a repeated return must not release it
        f.repository
            .equipment
            .update(
                f.equipment.id,
                &UpdateEquipment {
                    availability_status: Some(AvailabilityStatus::Reserved),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = f.service.return_loan(loan.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = f
            .service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::TotalLoss,
                    damage_notes: None,
                    new_condition: Some(EquipmentCondition::Damaged),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let equipment = f.repository.equipment.get_by_id(f.equipment.id).await.unwrap();
        assert_eq!(equipment.availability_status, AvailabilityStatus::Reserved);
        assert_eq!(equipment.condition, EquipmentCondition::Excellent);
    }

    #[tokio::test]
    async fn test_return_unknown_loan() {
        let f = fixture().await;
        let err = f.service.return_loan(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn test_return_with_damage_requires_condition() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        let err = f
            .service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::Minor,
                    damage_notes: Some("scratches".into()),
                    new_condition: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = f.repository.loans.get_by_id(loan.id).await.unwrap();
        assert!(stored.is_open());
        assert_eq!(availability(&f).await, AvailabilityStatus::Borrowed);
    }

    #[tokio::test]
    async fn test_late_fee_uses_configured_rate() {
        let policy = LoanPolicy {
            rate_per_day: Decimal::new(250, 2),
            report_overdue_status: true,
        };
        let f = fixture_with(policy.clone()).await;
        let loan = f.service.checkout(checkout_request(&f, 3)).await.unwrap();

        f.clock.advance_days(7);
        let outcome = f
            .service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::None,
                    damage_notes: None,
                    new_condition: Some(EquipmentCondition::Good),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.days_late, 4);
        assert_eq!(outcome.late_fine, Decimal::from(outcome.days_late) * policy.rate_per_day);
        assert_eq!(outcome.late_fine, Decimal::new(1000, 2));
        assert_eq!(f.service.policy(), &policy);
    }

    #[test]
    fn test_late_fee_never_negative() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.late_fee(0), Decimal::ZERO);
        assert_eq!(policy.late_fee(-4), Decimal::ZERO);
        assert_eq!(policy.late_fee(3), Decimal::new(15, 0));
    }

    #[tokio::test]
    async fn test_overdue_is_derived_from_clock() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        f.clock.advance_days(7);
        assert!(f.service.list_overdue().await.unwrap().is_empty());
        assert_eq!(f.service.get(loan.id).await.unwrap().status, LoanStatus::Borrowed);

        f.clock.advance_days(2);
        let overdue = f.service.list_overdue().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].days_overdue, 2);
        assert_eq!(overdue[0].status, LoanStatus::Overdue);

        // stored status is untouched
        let stored = f.repository.loans.get_by_id(loan.id).await.unwrap();
        assert_eq!(stored.status, LoanStatus::Borrowed);

        f.service.return_loan(loan.id).await.unwrap();
        assert!(f.service.list_overdue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_overdue_with_fixed_clock() {
        let repository = Repository::in_memory();
        let student = repository
            .students
            .create(&CreateStudent {
                first_name: "Alan".into(),
                last_name: "Turing".into(),
                email: "alan@school.edu".into(),
                program: None,
                year_level: Some(9),
                status: None,
            })
            .await
            .unwrap();

        let mut due_dates = Vec::new();
        for (i, due) in [-5i64, 0, 4].into_iter().enumerate() {
            let equipment = repository
                .equipment
                .create(&CreateEquipment {
                    name: format!("Tablet {}", i),
                    model: None,
                    category: Some("Tablet".into()),
                    serial_number: None,
                    condition: None,
                    availability_status: None,
                })
                .await
                .unwrap();
            let date_due = t0() + Duration::days(due);
            repository
                .loans
                .checkout(&NewLoan {
                    id: Uuid::new_v4(),
                    student_id: student.id,
                    equipment_id: equipment.id,
                    date_borrowed: t0() - Duration::days(10),
                    date_due,
                    notes: None,
                })
                .await
                .unwrap();
            due_dates.push(date_due);
        }

        let mut clock = MockClock::new();
        clock.expect_today().return_const(t0());
        let service = LoansService::new(repository, Arc::new(clock), LoanPolicy::default());

        let overdue = service.list_overdue().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].date_due, due_dates[0]);
        assert_eq!(overdue[0].days_overdue, 5);
        assert!(overdue[0].is_overdue);

        let active = service.list_active().await.unwrap();
        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|l| l.date_returned.is_none()));
    }

    #[tokio::test]
    async fn test_overdue_label_can_be_disabled() {
        let policy = LoanPolicy {
            report_overdue_status: false,
            ..LoanPolicy::default()
        };
        let f = fixture_with(policy).await;
        let loan = f.service.checkout(checkout_request(&f, 1)).await.unwrap();

        f.clock.advance_days(3);
        let view = f.service.get(loan.id).await.unwrap();
        assert_eq!(view.status, LoanStatus::Borrowed);
        assert!(view.is_overdue);
        assert_eq!(view.days_overdue, 2);
    }

    #[tokio::test]
    async fn test_date_returned_set_iff_returned() {
        let f = fixture().await;
        let first = f.service.checkout(checkout_request(&f, 7)).await.unwrap();
        f.service.return_loan(first.id).await.unwrap();
        f.service.checkout(checkout_request(&f, 3)).await.unwrap();
        f.clock.advance_days(5);

        let all = f.service.list(&LoanQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        for loan in all {
            let open = matches!(loan.status, LoanStatus::Borrowed | LoanStatus::Overdue);
            assert_eq!(loan.date_returned.is_none(), open);
        }

        let returned = f
            .service
            .list(&LoanQuery {
                status: Some(LoanStatus::Returned),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].id, first.id);

        let overdue = f
            .service
            .list(&LoanQuery {
                student_id: Some(f.student.id),
                overdue_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].days_overdue, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_single_winner() {
        let f = fixture().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let request = checkout_request(&f, 7);
            handles.push(tokio::spawn(async move { service.checkout(request).await }));
        }

        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(e) => assert!(matches!(e, AppError::Conflict(..)), "got {:?}", e),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(f.service.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transitions_write_audit_entries() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        f.clock.advance_days(10);
        f.service
            .return_with_damage(
                loan.id,
                ReturnWithDamage {
                    damage_status: DamageStatus::Major,
                    damage_notes: Some("cracked screen".into()),
                    new_condition: Some(EquipmentCondition::Poor),
                },
            )
            .await
            .unwrap();

        let err = f.service.checkout(checkout_request(&f, 20)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ErrorCode::EquipmentNotAvailable, _)));

        let entries = f.repository.audit.recent(100).await.unwrap();
        assert_eq!(entries.len(), 2);

        let returned = &entries[0];
        assert_eq!(returned.action, AuditAction::Update);
        assert_eq!(returned.table_name, "loans");
        assert_eq!(returned.record_id, loan.id);
        assert_eq!(returned.details["action"], "return_with_damage");
        assert_eq!(returned.details["damage_status"], "Major");
        assert_eq!(returned.details["new_condition"], "Poor");
        assert_eq!(returned.details["days_late"], 3);
        assert_eq!(returned.details["late_fine"].as_f64(), Some(15.0));

        let created = &entries[1];
        assert_eq!(created.action, AuditAction::Create);
        assert_eq!(created.record_id, loan.id);
        assert_eq!(created.details["date_due"], "2026-03-08");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_checkout_during_damage_return_never_borrows() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        let returning = {
            let service = f.service.clone();
            tokio::spawn(async move {
                service
                    .return_with_damage(
                        loan.id,
                        ReturnWithDamage {
                            damage_status: DamageStatus::Major,
                            damage_notes: None,
                            new_condition: Some(EquipmentCondition::Poor),
                        },
                    )
                    .await
            })
        };
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let request = checkout_request(&f, 5);
            handles.push(tokio::spawn(async move { service.checkout(request).await }));
        }

        returning.await.unwrap().unwrap();
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(
                matches!(err, AppError::Conflict(ErrorCode::EquipmentNotAvailable, _)),
                "got {:?}",
                err
            );
        }

        assert_eq!(availability(&f).await, AvailabilityStatus::Damaged);
        assert!(f.service.list_active().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_checkout_during_plain_return() {
        let f = fixture().await;
        let loan = f.service.checkout(checkout_request(&f, 7)).await.unwrap();

        let returning = {
            let service = f.service.clone();
            tokio::spawn(async move { service.return_loan(loan.id).await })
        };
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let request = checkout_request(&f, 5);
            handles.push(tokio::spawn(async move { service.checkout(request).await }));
        }

        let returned = returning.await.unwrap().unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);

        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(view) => {
                    assert_ne!(view.id, loan.id);
                    won += 1;
                }
                Err(e) => assert!(
                    matches!(e, AppError::Conflict(ErrorCode::EquipmentNotAvailable, _)),
                    "got {:?}",
                    e
                ),
            }
        }
        assert!(won <= 1);

        let active = f.service.list_active().await.unwrap();
        assert_eq!(active.len(), won);
        let expected = if won == 1 {
            AvailabilityStatus::Borrowed
        } else {
            AvailabilityStatus::Available
        };
        assert_eq!(availability(&f).await, expected);
    }
}
