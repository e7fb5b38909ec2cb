//! Data models for equipment lending

pub mod audit;
pub mod enums;
pub mod equipment;
pub mod loan;
pub mod student;

// Re-export commonly used types
pub use audit::AuditLog;
pub use enums::{AuditAction, AvailabilityStatus, DamageStatus, EquipmentCondition, LoanStatus, StudentStatus};
pub use equipment::Equipment;
pub use loan::{Loan, LoanView, ReturnOutcome};
pub use student::Student;
