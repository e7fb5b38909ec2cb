//! Repository layer: store contracts and their PostgreSQL / in-memory backends
//!
//! The registries expose plain CRUD. Every availability or condition change
//! that accompanies a loan transition is written by [`LoanRepository`] inside
//! the same atomic unit as the loan row: a transaction holding a row lock on
//! the equipment (PostgreSQL) or the store mutex (memory). The audit entry
//! for each transition is written in that same unit.

pub mod audit;
pub mod equipment;
pub mod loans;
pub mod memory;
pub mod students;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        audit::AuditLog,
        equipment::{CreateEquipment, Equipment, EquipmentQuery, UpdateEquipment},
        loan::{Loan, LoanClosure, LoanFilter, NewLoan},
        student::{CreateStudent, Student, StudentQuery, UpdateStudent},
    },
};

/// Student registry
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Student>;
    async fn create(&self, data: &CreateStudent) -> AppResult<Student>;
    async fn update(&self, id: Uuid, data: &UpdateStudent) -> AppResult<Student>;
    /// Refuses while the student holds an open loan
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn list_programs(&self) -> AppResult<Vec<String>>;
}

/// Equipment registry
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Equipment>;
    async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment>;
    async fn update(&self, id: Uuid, data: &UpdateEquipment) -> AppResult<Equipment>;
    /// Refuses while the equipment is on an open loan
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn list_categories(&self) -> AppResult<Vec<String>>;
}

/// Loan store; owns the equipment side effects of loan transitions
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Loan>;
    async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;
    /// Require an existing, active student, compare-and-set the equipment
    /// Available -> Borrowed, insert the loan and its audit entry: all or
    /// nothing.
    async fn checkout(&self, loan: &NewLoan) -> AppResult<Loan>;
    /// Close an open loan, release its equipment and record the audit entry,
    /// all or nothing.
    /// Fails with `InvalidState` if the loan is already closed.
    async fn close(&self, closure: &LoanClosure) -> AppResult<Loan>;
}

/// Audit trail; entries are appended by the loan store
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLog>>;
}

/// Main repository struct holding one handle per store contract
#[derive(Clone)]
pub struct Repository {
    pub students: Arc<dyn StudentRepository>,
    pub equipment: Arc<dyn EquipmentRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repository {
    /// Create a repository backed by the given PostgreSQL pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            students: Arc::new(students::PgStudentsRepository::new(pool.clone())),
            equipment: Arc::new(equipment::PgEquipmentRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            audit: Arc::new(audit::PgAuditRepository::new(pool)),
        }
    }

    /// Create a repository backed by a volatile in-process store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            students: store.clone(),
            equipment: store.clone(),
            loans: store.clone(),
            audit: store,
        }
    }
}

/// Map a unique-constraint violation to a `Conflict`, anything else to `Database`
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(ErrorCode::Duplicate, format!("{} already exists", what))
        }
        _ => AppError::Database(err),
    }
}
