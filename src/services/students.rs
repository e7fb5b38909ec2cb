//! Student registry service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::student::{validate_year_level, CreateStudent, Student, StudentQuery, UpdateStudent},
    repository::Repository,
};

#[derive(Clone)]
pub struct StudentsService {
    repository: Repository,
}

impl StudentsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        self.repository.students.list(query).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Student> {
        self.repository.students.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateStudent) -> AppResult<Student> {
        data.validate()?;
        validate_year_level(data.year_level)?;

        let student = self.repository.students.create(data).await?;
        tracing::info!(student_id = %student.id, "Student created");
        Ok(student)
    }

    pub async fn update(&self, id: Uuid, data: &UpdateStudent) -> AppResult<Student> {
        data.validate()?;
        validate_year_level(data.year_level)?;

        let student = self.repository.students.update(id, data).await?;
        tracing::info!(student_id = %student.id, status = %student.status, "Student updated");
        Ok(student)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.students.delete(id).await?;
        tracing::info!(student_id = %id, "Student deleted");
        Ok(())
    }

    /// Distinct programs, for filtering
    pub async fn list_programs(&self) -> AppResult<Vec<String>> {
        self.repository.students.list_programs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn create(email: &str, year_level: Option<i32>) -> CreateStudent {
        CreateStudent {
            first_name: "Katherine".into(),
            last_name: "Johnson".into(),
            email: email.into(),
            program: Some("Mathematics".into()),
            year_level,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = StudentsService::new(Repository::in_memory());

        let err = service.create(&create("no-at-sign", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service.create(&create("k@nasa.gov", Some(6))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let student = service.create(&create("k@nasa.gov", Some(12))).await.unwrap();
        assert!(student.is_active());
        assert!(service.list(&StudentQuery::default()).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = StudentsService::new(Repository::in_memory());
        service.create(&create("k@nasa.gov", None)).await.unwrap();
        let err = service.create(&create("k@nasa.gov", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(..)));
    }

    #[tokio::test]
    async fn test_search_and_programs() {
        let service = StudentsService::new(Repository::in_memory());
        service.create(&create("k@nasa.gov", Some(3))).await.unwrap();
        let mut other = create("d@nasa.gov", Some(3));
        other.first_name = "Dorothy".into();
        other.last_name = "Vaughan".into();
        other.program = Some("Engineering".into());
        service.create(&other).await.unwrap();

        let found = service
            .list(&StudentQuery {
                q: Some("VAUG".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Dorothy");

        assert_eq!(
            service.list_programs().await.unwrap(),
            vec!["Engineering".to_string(), "Mathematics".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_unknown_student() {
        let service = StudentsService::new(Repository::in_memory());
        let err = service
            .update(Uuid::new_v4(), &UpdateStudent::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }
}
