//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::{AvailabilityStatus, EquipmentCondition};
use crate::error::{AppError, AppResult, ErrorCode};

/// Equipment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub model: Option<String>,
    pub category: Option<String>,
    /// Unique when present
    pub serial_number: Option<String>,
    pub condition: EquipmentCondition,
    pub availability_status: AvailabilityStatus,
    pub created_at: DateTime<Utc>,
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Equipment name is required"))]
    pub name: String,
    pub model: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    /// Defaults to Good
    pub condition: Option<EquipmentCondition>,
    /// Defaults to Available; Borrowed is refused
    pub availability_status: Option<AvailabilityStatus>,
}

/// Update equipment request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, message = "Equipment name cannot be empty"))]
    pub name: Option<String>,
    pub model: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub condition: Option<EquipmentCondition>,
    pub availability_status: Option<AvailabilityStatus>,
}

/// Availability may be edited by staff except into or out of `Borrowed`,
/// which only checkout and return may write.
pub fn check_manual_availability(
    current: AvailabilityStatus,
    requested: AvailabilityStatus,
) -> AppResult<()> {
    if current == requested {
        return Ok(());
    }
    if requested == AvailabilityStatus::Borrowed {
        return Err(AppError::Conflict(
            ErrorCode::BadValue,
            "Equipment can only become Borrowed through checkout".to_string(),
        ));
    }
    if current == AvailabilityStatus::Borrowed {
        return Err(AppError::Conflict(
            ErrorCode::EquipmentOnLoan,
            "Equipment is on loan; return the loan to release it".to_string(),
        ));
    }
    Ok(())
}

/// Equipment search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct EquipmentQuery {
    /// Substring of name, model or serial number (case-insensitive)
    pub q: Option<String>,
    pub category: Option<String>,
    pub condition: Option<EquipmentCondition>,
    pub status: Option<AvailabilityStatus>,
}

impl EquipmentQuery {
    pub fn available() -> Self {
        Self {
            status: Some(AvailabilityStatus::Available),
            ..Default::default()
        }
    }

    /// In-process evaluation of the filters, used by stores that hold records in memory
    pub fn matches(&self, equipment: &Equipment) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let hit = |field: Option<&str>| {
                field.map(|f| f.to_lowercase().contains(&needle)).unwrap_or(false)
            };
            if !(hit(Some(&equipment.name))
                || hit(equipment.model.as_deref())
                || hit(equipment.serial_number.as_deref()))
            {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if equipment.category.as_ref() != Some(category) {
                return false;
            }
        }
        if let Some(condition) = self.condition {
            if equipment.condition != condition {
                return false;
            }
        }
        if let Some(status) = self.status {
            if equipment.availability_status != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment(name: &str, serial: Option<&str>) -> Equipment {
        Equipment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            model: Some("XPS 13".to_string()),
            category: Some("Laptop".to_string()),
            serial_number: serial.map(str::to_string),
            condition: EquipmentCondition::Good,
            availability_status: AvailabilityStatus::Available,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_manual_availability_guards_borrowed() {
        use AvailabilityStatus::*;
        assert!(check_manual_availability(Available, Reserved).is_ok());
        assert!(check_manual_availability(Damaged, Available).is_ok());
        assert!(check_manual_availability(Borrowed, Borrowed).is_ok());
        assert!(matches!(
            check_manual_availability(Available, Borrowed),
            Err(AppError::Conflict(..))
        ));
        assert!(matches!(
            check_manual_availability(Borrowed, Available),
            Err(AppError::Conflict(..))
        ));
    }

    #[test]
    fn test_query_matches_text_case_insensitive() {
        let laptop = equipment("Dell Laptop", Some("SN-001"));
        let query = EquipmentQuery {
            q: Some("xps".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&laptop));

        let query = EquipmentQuery {
            q: Some("sn-001".to_string()),
            status: Some(AvailabilityStatus::Damaged),
            ..Default::default()
        };
        assert!(!query.matches(&laptop));
        assert!(EquipmentQuery::available().matches(&laptop));
    }
}
