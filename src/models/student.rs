//! Student (borrower) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::StudentStatus;
use crate::error::{AppError, AppResult};

/// Student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub program: Option<String>,
    /// Secondary school (7-12) or college (1-4) year
    pub year_level: Option<i32>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

/// Create student request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateStudent {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(contains(pattern = "@", message = "Invalid email format"))]
    pub email: String,
    pub program: Option<String>,
    pub year_level: Option<i32>,
    /// Defaults to active
    pub status: Option<StudentStatus>,
}

/// Update student request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStudent {
    #[validate(length(min = 1, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[validate(contains(pattern = "@", message = "Invalid email format"))]
    pub email: Option<String>,
    pub program: Option<String>,
    pub year_level: Option<i32>,
    pub status: Option<StudentStatus>,
}

/// Student search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct StudentQuery {
    /// Substring of first name, last name or email (case-insensitive)
    pub q: Option<String>,
    pub program: Option<String>,
    pub year_level: Option<i32>,
    pub status: Option<StudentStatus>,
}

impl StudentQuery {
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let hit = [&student.first_name, &student.last_name, &student.email]
                .iter()
                .any(|f| f.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(ref program) = self.program {
            if student.program.as_ref() != Some(program) {
                return false;
            }
        }
        if self.year_level.is_some() && student.year_level != self.year_level {
            return false;
        }
        if let Some(status) = self.status {
            if student.status != status {
                return false;
            }
        }
        true
    }
}

/// Year levels are either secondary grades 7-12 or college years 1-4
pub fn validate_year_level(year_level: Option<i32>) -> AppResult<()> {
    match year_level {
        None => Ok(()),
        Some(y) if (1..=4).contains(&y) || (7..=12).contains(&y) => Ok(()),
        Some(y) => Err(AppError::Validation(format!(
            "Year level {} must be between 7 and 12 or between 1 and 4",
            y
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(email: &str) -> CreateStudent {
        CreateStudent {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            program: None,
            year_level: None,
            status: None,
        }
    }

    #[test]
    fn test_email_requires_at_sign() {
        assert!(create("ada@example.org").validate().is_ok());
        assert!(create("ada.example.org").validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut data = create("ada@example.org");
        data.first_name = String::new();
        let err: AppError = data.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("First name")));
    }

    #[test]
    fn test_year_level_domain() {
        for y in [1, 4, 7, 12] {
            assert!(validate_year_level(Some(y)).is_ok(), "{} should be valid", y);
        }
        for y in [0, 5, 6, 13, -1] {
            assert!(validate_year_level(Some(y)).is_err(), "{} should be invalid", y);
        }
        assert!(validate_year_level(None).is_ok());
    }
}
