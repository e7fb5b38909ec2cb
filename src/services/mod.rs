//! Business logic services

pub mod audit;
pub mod clock;
pub mod equipment;
pub mod loans;
pub mod students;

use std::sync::Arc;

use crate::{config::LoansConfig, repository::Repository};

use self::clock::Clock;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub students: students::StudentsService,
    pub equipment: equipment::EquipmentService,
    pub loans: loans::LoansService,
    pub audit: audit::AuditService,
}

impl Services {
    /// Create all services with the given repository and calendar
    pub fn new(repository: Repository, loans_config: &LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            students: students::StudentsService::new(repository.clone()),
            equipment: equipment::EquipmentService::new(repository.clone()),
            audit: audit::AuditService::new(repository.clone()),
            loans: loans::LoansService::new(
                repository,
                clock,
                loans::LoanPolicy::from(loans_config),
            ),
        }
    }
}
