//! Volatile in-process store
//!
//! One mutex guards students, equipment and loans together, so every
//! operation (and in particular checkout and close) is atomic with respect to
//! every other.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AuditRepository, EquipmentRepository, LoanRepository, StudentRepository};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        audit::{AuditLog, NewAuditEntry},
        enums::{AvailabilityStatus, EquipmentCondition, LoanStatus, StudentStatus},
        equipment::{
            check_manual_availability, CreateEquipment, Equipment, EquipmentQuery,
            UpdateEquipment,
        },
        loan::{Loan, LoanClosure, LoanFilter, NewLoan},
        student::{CreateStudent, Student, StudentQuery, UpdateStudent},
    },
};

#[derive(Default)]
struct MemoryState {
    students: HashMap<Uuid, Student>,
    equipment: HashMap<Uuid, Equipment>,
    loans: HashMap<Uuid, Loan>,
    /// Oldest first
    audit: Vec<AuditLog>,
}

impl MemoryState {
    fn student(&self, id: Uuid) -> AppResult<&Student> {
        self.students
            .get(&id)
            .ok_or_else(|| AppError::student_not_found(id))
    }

    fn equipment(&self, id: Uuid) -> AppResult<&Equipment> {
        self.equipment
            .get(&id)
            .ok_or_else(|| AppError::equipment_not_found(id))
    }

    fn equipment_mut(&mut self, id: Uuid) -> AppResult<&mut Equipment> {
        self.equipment
            .get_mut(&id)
            .ok_or_else(|| AppError::equipment_not_found(id))
    }

    fn record(&mut self, entry: NewAuditEntry) {
        self.audit.push(entry.into_log(Utc::now()));
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.students
            .values()
            .any(|s| s.email == email && Some(s.id) != except)
    }

    fn serial_taken(&self, serial: &str, except: Option<Uuid>) -> bool {
        self.equipment
            .values()
            .any(|e| e.serial_number.as_deref() == Some(serial) && Some(e.id) != except)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        let state = self.state.lock().await;
        let mut students: Vec<Student> = state
            .students
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        students.sort_by(|a, b| {
            (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name))
        });
        Ok(students)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Student> {
        let state = self.state.lock().await;
        state.student(id).cloned()
    }

    async fn create(&self, data: &CreateStudent) -> AppResult<Student> {
        let mut state = self.state.lock().await;
        if state.email_taken(&data.email, None) {
            return Err(AppError::Conflict(
                ErrorCode::Duplicate,
                "Student with this email already exists".to_string(),
            ));
        }
        let student = Student {
            id: Uuid::new_v4(),
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            email: data.email.clone(),
            program: data.program.clone(),
            year_level: data.year_level,
            status: data.status.unwrap_or(StudentStatus::Active),
            created_at: Utc::now(),
        };
        state.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update(&self, id: Uuid, data: &UpdateStudent) -> AppResult<Student> {
        let mut state = self.state.lock().await;
        state.student(id)?;
        if let Some(ref email) = data.email {
            if state.email_taken(email, Some(id)) {
                return Err(AppError::Conflict(
                    ErrorCode::Duplicate,
                    "Student with this email already exists".to_string(),
                ));
            }
        }

        let student = state
            .students
            .get_mut(&id)
            .ok_or_else(|| AppError::student_not_found(id))?;
        if let Some(ref v) = data.first_name {
            student.first_name = v.clone();
        }
        if let Some(ref v) = data.last_name {
            student.last_name = v.clone();
        }
        if let Some(ref v) = data.email {
            student.email = v.clone();
        }
        if data.program.is_some() {
            student.program = data.program.clone();
        }
        if data.year_level.is_some() {
            student.year_level = data.year_level;
        }
        if let Some(status) = data.status {
            student.status = status;
        }
        Ok(student.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.student(id)?;
        let open_loans = state
            .loans
            .values()
            .filter(|l| l.student_id == id && l.is_open())
            .count();
        if open_loans > 0 {
            return Err(AppError::Conflict(
                ErrorCode::StudentHasLoans,
                format!("Student {} has {} open loans", id, open_loans),
            ));
        }
        state.loans.retain(|_, l| l.student_id != id);
        state.students.remove(&id);
        Ok(())
    }

    async fn list_programs(&self) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let programs: BTreeSet<String> = state
            .students
            .values()
            .filter_map(|s| s.program.clone())
            .filter(|p| !p.is_empty())
            .collect();
        Ok(programs.into_iter().collect())
    }
}

#[async_trait]
impl EquipmentRepository for MemoryStore {
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let state = self.state.lock().await;
        let mut equipment: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        equipment.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(equipment)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Equipment> {
        let state = self.state.lock().await;
        state.equipment(id).cloned()
    }

    async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let mut state = self.state.lock().await;
        if let Some(ref serial) = data.serial_number {
            if state.serial_taken(serial, None) {
                return Err(AppError::Conflict(
                    ErrorCode::Duplicate,
                    "Equipment with this serial number already exists".to_string(),
                ));
            }
        }
        let equipment = Equipment {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            model: data.model.clone(),
            category: data.category.clone(),
            serial_number: data.serial_number.clone(),
            condition: data.condition.unwrap_or(EquipmentCondition::Good),
            availability_status: data
                .availability_status
                .unwrap_or(AvailabilityStatus::Available),
            created_at: Utc::now(),
        };
        state.equipment.insert(equipment.id, equipment.clone());
        Ok(equipment)
    }

    async fn update(&self, id: Uuid, data: &UpdateEquipment) -> AppResult<Equipment> {
        let mut state = self.state.lock().await;
        state.equipment(id)?;
        if let Some(ref serial) = data.serial_number {
            if state.serial_taken(serial, Some(id)) {
                return Err(AppError::Conflict(
                    ErrorCode::Duplicate,
                    "Equipment with this serial number already exists".to_string(),
                ));
            }
        }

        let equipment = state.equipment_mut(id)?;
        if let Some(requested) = data.availability_status {
            check_manual_availability(equipment.availability_status, requested)?;
        }
        if let Some(ref v) = data.name {
            equipment.name = v.clone();
        }
        if data.model.is_some() {
            equipment.model = data.model.clone();
        }
        if data.category.is_some() {
            equipment.category = data.category.clone();
        }
        if data.serial_number.is_some() {
            equipment.serial_number = data.serial_number.clone();
        }
        if let Some(condition) = data.condition {
            equipment.condition = condition;
        }
        if let Some(status) = data.availability_status {
            equipment.availability_status = status;
        }
        Ok(equipment.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.equipment(id)?;
        if state.loans.values().any(|l| l.equipment_id == id && l.is_open()) {
            return Err(AppError::Conflict(
                ErrorCode::EquipmentOnLoan,
                format!("Equipment {} is currently on loan", id),
            ));
        }
        state.loans.retain(|_, l| l.equipment_id != id);
        state.equipment.remove(&id);
        Ok(())
    }

    async fn list_categories(&self) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let categories: BTreeSet<String> = state
            .equipment
            .values()
            .filter_map(|e| e.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(categories.into_iter().collect())
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        let state = self.state.lock().await;
        state
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::loan_not_found(id))
    }

    async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        loans.sort_by(|a, b| {
            (b.date_borrowed, b.created_at).cmp(&(a.date_borrowed, a.created_at))
        });
        Ok(loans)
    }

    async fn checkout(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut state = self.state.lock().await;

        let student = state.student(loan.student_id)?;
        if !student.is_active() {
            return Err(AppError::Conflict(
                ErrorCode::StudentInactive,
                format!("Student {} is inactive", student.full_name()),
            ));
        }

        let equipment = state.equipment_mut(loan.equipment_id)?;
        if equipment.availability_status != AvailabilityStatus::Available {
            return Err(AppError::Conflict(
                ErrorCode::EquipmentNotAvailable,
                format!(
                    "Equipment {} is not available ({})",
                    loan.equipment_id, equipment.availability_status
                ),
            ));
        }
        equipment.availability_status = AvailabilityStatus::Borrowed;

        let record = Loan {
            id: loan.id,
            student_id: loan.student_id,
            equipment_id: loan.equipment_id,
            date_borrowed: loan.date_borrowed,
            date_due: loan.date_due,
            date_returned: None,
            status: LoanStatus::Borrowed,
            notes: loan.notes.clone(),
            damage: None,
            days_late: None,
            late_fee: None,
            created_at: Utc::now(),
        };
        state.loans.insert(record.id, record.clone());
        state.record(NewAuditEntry::checkout(loan));
        Ok(record)
    }

    async fn close(&self, closure: &LoanClosure) -> AppResult<Loan> {
        let mut state = self.state.lock().await;

        let current = state
            .loans
            .get(&closure.loan_id)
            .ok_or_else(|| AppError::loan_not_found(closure.loan_id))?;
        if !current.is_open() {
            return Err(AppError::InvalidState(format!(
                "Loan {} already returned",
                closure.loan_id
            )));
        }
        let equipment_id = current.equipment_id;

        // equipment first: a missing record must leave the loan untouched
        let equipment = state.equipment_mut(equipment_id)?;
        if equipment.availability_status != AvailabilityStatus::Borrowed {
            tracing::warn!(
                loan_id = %closure.loan_id,
                equipment_id = %equipment_id,
                "Equipment of an open loan was {} instead of Borrowed",
                equipment.availability_status
            );
        }
        equipment.availability_status = closure.release_to;
        if let Some(condition) = closure.new_condition {
            equipment.condition = condition;
        }

        let loan = state
            .loans
            .get_mut(&closure.loan_id)
            .ok_or_else(|| AppError::loan_not_found(closure.loan_id))?;
        loan.status = LoanStatus::Returned;
        loan.date_returned = Some(closure.date_returned);
        loan.days_late = Some(closure.days_late);
        loan.late_fee = Some(closure.late_fee);
        loan.damage = closure.damage.clone();
        let loan = loan.clone();

        state.record(NewAuditEntry::closure(closure));
        Ok(loan)
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLog>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }
}
