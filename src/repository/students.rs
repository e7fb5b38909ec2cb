//! Students repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use super::{map_unique_violation, StudentRepository};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        enums::StudentStatus,
        student::{CreateStudent, Student, StudentQuery, UpdateStudent},
    },
};

#[derive(Debug, FromRow)]
struct StudentRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    program: Option<String>,
    year_level: Option<i32>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<StudentRow> for Student {
    type Error = AppError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Student {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            program: row.program,
            year_level: row.year_level,
            status: row.status.parse().map_err(|_| {
                AppError::Internal(format!("Student {} has unknown status '{}'", row.id, row.status))
            })?,
            created_at: row.created_at,
        })
    }
}

/// Share-lock the student row for the rest of the transaction and require it
/// to be active. Concurrent deletes or status updates wait for the commit.
pub(super) async fn lock_active(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    let (first_name, last_name, status): (String, String, String) = sqlx::query_as(
        "SELECT first_name, last_name, status FROM students WHERE id = $1 FOR SHARE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::student_not_found(id))?;

    let status: StudentStatus = status.parse().map_err(|_| {
        AppError::Internal(format!("Student {} has unknown status '{}'", id, status))
    })?;
    if status != StudentStatus::Active {
        return Err(AppError::Conflict(
            ErrorCode::StudentInactive,
            format!("Student {} {} is inactive", first_name, last_name),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgStudentsRepository {
    pool: Pool<Postgres>,
}

impl PgStudentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for PgStudentsRepository {
    /// List students matching the query
    async fn list(&self, query: &StudentQuery) -> AppResult<Vec<Student>> {
        let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let rows = sqlx::query_as::<_, StudentRow>(
            r#"
            SELECT * FROM students
            WHERE ($1::text IS NULL
                   OR first_name ILIKE '%' || $1 || '%'
                   OR last_name ILIKE '%' || $1 || '%'
                   OR email ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR program = $2)
              AND ($3::int IS NULL OR year_level = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY last_name, first_name
            "#,
        )
        .bind(q)
        .bind(&query.program)
        .bind(query.year_level)
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Student::try_from).collect()
    }

    /// Get student by ID
    async fn get_by_id(&self, id: Uuid) -> AppResult<Student> {
        sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::student_not_found(id))?
            .try_into()
    }

    /// Create a student
    async fn create(&self, data: &CreateStudent) -> AppResult<Student> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            INSERT INTO students (id, first_name, last_name, email, program, year_level, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.program)
        .bind(data.year_level)
        .bind(data.status.unwrap_or(StudentStatus::Active).as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Student with this email"))?;

        row.try_into()
    }

    /// Update a student; absent fields are left unchanged
    async fn update(&self, id: Uuid, data: &UpdateStudent) -> AppResult<Student> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            UPDATE students SET
                first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                email      = COALESCE($4, email),
                program    = COALESCE($5, program),
                year_level = COALESCE($6, year_level),
                status     = COALESCE($7, status)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.program)
        .bind(data.year_level)
        .bind(data.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Student with this email"))?
        .ok_or_else(|| AppError::student_not_found(id))?;

        row.try_into()
    }

    /// Delete a student and their loan history
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM students WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::student_not_found(id));
        }

        let open_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE student_id = $1 AND status <> 'Returned'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open_loans > 0 {
            return Err(AppError::Conflict(
                ErrorCode::StudentHasLoans,
                format!("Student {} has {} open loans", id, open_loans),
            ));
        }

        sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Distinct non-empty programs, sorted
    async fn list_programs(&self) -> AppResult<Vec<String>> {
        let programs: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT program FROM students WHERE program IS NOT NULL AND program <> '' ORDER BY program",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(programs)
    }
}
