//! Shared domain enums
//!
//! Every enum is exchanged and stored as its exact, case-sensitive label.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Implements `as_str`, `Display` and `FromStr` from one label table.
/// Extra `alias` labels are accepted on parse only (legacy stored values).
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "Invalid {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// Physical condition of an equipment item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum EquipmentCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

labelled_enum!(EquipmentCondition {
    Excellent => "Excellent",
    Good => "Good",
    Fair => "Fair",
    Poor => "Poor",
    Damaged => "Damaged",
});

/// Whether an equipment item can be checked out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AvailabilityStatus {
    Available,
    #[serde(alias = "On Loan")]
    Borrowed,
    Reserved,
    Damaged,
}

labelled_enum!(AvailabilityStatus {
    Available => "Available",
    Borrowed => "Borrowed" | "On Loan",
    Reserved => "Reserved",
    Damaged => "Damaged",
});

// ---------------------------------------------------------------------------
// Student
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

labelled_enum!(StudentStatus {
    Active => "active",
    Inactive => "inactive",
});

// ---------------------------------------------------------------------------
// Loan
// ---------------------------------------------------------------------------

/// Loan lifecycle status
///
/// Only `Borrowed` and `Returned` are written by the server. `Overdue` is
/// derived on read; it is accepted from storage so that rows written by older
/// clients still load as open loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    Borrowed,
    Overdue,
    Returned,
}

labelled_enum!(LoanStatus {
    Borrowed => "Borrowed",
    Overdue => "Overdue",
    Returned => "Returned",
});

impl LoanStatus {
    /// Open loans hold their equipment and can still be returned
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Borrowed | LoanStatus::Overdue)
    }
}

/// Damage found when a loan is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
pub enum DamageStatus {
    #[default]
    None,
    Minor,
    Major,
    #[serde(rename = "Total-loss", alias = "Lost")]
    TotalLoss,
}

labelled_enum!(DamageStatus {
    None => "None",
    Minor => "Minor",
    Major => "Major",
    TotalLoss => "Total-loss" | "Lost",
});

impl DamageStatus {
    pub fn is_damaged(&self) -> bool {
        !matches!(self, DamageStatus::None)
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Kind of change recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

labelled_enum!(AuditAction {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_exact() {
        assert_eq!(
            serde_json::to_string(&DamageStatus::TotalLoss).unwrap(),
            "\"Total-loss\""
        );
        assert_eq!(
            serde_json::to_string(&AvailabilityStatus::Borrowed).unwrap(),
            "\"Borrowed\""
        );
        assert_eq!(serde_json::to_string(&StudentStatus::Active).unwrap(), "\"active\"");
        assert_eq!(LoanStatus::Overdue.to_string(), "Overdue");
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!("available".parse::<AvailabilityStatus>().is_err());
        assert!(serde_json::from_str::<LoanStatus>("\"returned\"").is_err());
        assert!("total-loss".parse::<DamageStatus>().is_err());
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(
            "On Loan".parse::<AvailabilityStatus>().unwrap(),
            AvailabilityStatus::Borrowed
        );
        assert_eq!(
            serde_json::from_str::<DamageStatus>("\"Lost\"").unwrap(),
            DamageStatus::TotalLoss
        );
        // aliases never come back out
        assert_eq!(DamageStatus::TotalLoss.as_str(), "Total-loss");
    }

    #[test]
    fn test_parse_matches_serde_for_every_label() {
        for condition in EquipmentCondition::ALL {
            let json = serde_json::to_string(condition).unwrap();
            assert_eq!(json, format!("\"{}\"", condition.as_str()));
            assert_eq!(condition.as_str().parse::<EquipmentCondition>().unwrap(), *condition);
        }
        for status in LoanStatus::ALL {
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_open_statuses() {
        assert!(LoanStatus::Borrowed.is_open());
        assert!(LoanStatus::Overdue.is_open());
        assert!(!LoanStatus::Returned.is_open());
    }
}
