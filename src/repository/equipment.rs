//! Equipment repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use super::{map_unique_violation, EquipmentRepository};
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        enums::{AvailabilityStatus, EquipmentCondition},
        equipment::{
            check_manual_availability, CreateEquipment, Equipment, EquipmentQuery,
            UpdateEquipment,
        },
    },
};

#[derive(Debug, FromRow)]
struct EquipmentRow {
    id: Uuid,
    name: String,
    model: Option<String>,
    category: Option<String>,
    serial_number: Option<String>,
    condition: String,
    availability_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        let bad = |field: &str, value: &str| {
            AppError::Internal(format!("Equipment {} has unknown {} '{}'", row.id, field, value))
        };
        Ok(Equipment {
            condition: row
                .condition
                .parse()
                .map_err(|_| bad("condition", &row.condition))?,
            availability_status: row
                .availability_status
                .parse()
                .map_err(|_| bad("availability status", &row.availability_status))?,
            id: row.id,
            name: row.name,
            model: row.model,
            category: row.category,
            serial_number: row.serial_number,
            created_at: row.created_at,
        })
    }
}

/// Lock the equipment row for the rest of the transaction and read its availability
pub(super) async fn lock_availability(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<AvailabilityStatus> {
    let status: String = sqlx::query_scalar(
        "SELECT availability_status FROM equipment WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::equipment_not_found(id))?;

    status.parse().map_err(|_| {
        AppError::Internal(format!("Equipment {} has unknown availability status '{}'", id, status))
    })
}

pub(super) async fn set_availability(
    conn: &mut PgConnection,
    id: Uuid,
    status: AvailabilityStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE equipment SET availability_status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn set_condition(
    conn: &mut PgConnection,
    id: Uuid,
    condition: EquipmentCondition,
) -> AppResult<()> {
    sqlx::query("UPDATE equipment SET condition = $2 WHERE id = $1")
        .bind(id)
        .bind(condition.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgEquipmentRepository {
    pool: Pool<Postgres>,
}

impl PgEquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentRepository for PgEquipmentRepository {
    /// List equipment matching the query
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let rows = sqlx::query_as::<_, EquipmentRow>(
            r#"
            SELECT * FROM equipment
            WHERE ($1::text IS NULL
                   OR name ILIKE '%' || $1 || '%'
                   OR model ILIKE '%' || $1 || '%'
                   OR serial_number ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR condition = $3)
              AND ($4::text IS NULL OR availability_status = $4)
            ORDER BY name
            "#,
        )
        .bind(q)
        .bind(&query.category)
        .bind(query.condition.map(|c| c.as_str()))
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Equipment::try_from).collect()
    }

    /// Get equipment by ID
    async fn get_by_id(&self, id: Uuid) -> AppResult<Equipment> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::equipment_not_found(id))?
            .try_into()
    }

    /// Create equipment
    async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, EquipmentRow>(
            r#"
            INSERT INTO equipment (id, name, model, category, serial_number, condition, availability_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.model)
        .bind(&data.category)
        .bind(&data.serial_number)
        .bind(data.condition.unwrap_or(EquipmentCondition::Good).as_str())
        .bind(data.availability_status.unwrap_or(AvailabilityStatus::Available).as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Equipment with this serial number"))?;

        row.try_into()
    }

    /// Update equipment; absent fields are left unchanged
    async fn update(&self, id: Uuid, data: &UpdateEquipment) -> AppResult<Equipment> {
        let mut tx = self.pool.begin().await?;

        let current = lock_availability(&mut tx, id).await?;
        if let Some(requested) = data.availability_status {
            check_manual_availability(current, requested)?;
        }

        let row = sqlx::query_as::<_, EquipmentRow>(
            r#"
            UPDATE equipment SET
                name                = COALESCE($2, name),
                model               = COALESCE($3, model),
                category            = COALESCE($4, category),
                serial_number       = COALESCE($5, serial_number),
                condition           = COALESCE($6, condition),
                availability_status = COALESCE($7, availability_status)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.model)
        .bind(&data.category)
        .bind(&data.serial_number)
        .bind(data.condition.map(|c| c.as_str()))
        .bind(data.availability_status.map(|s| s.as_str()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Equipment with this serial number"))?;

        tx.commit().await?;
        row.try_into()
    }

    /// Delete equipment and its loan history
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        lock_availability(&mut tx, id).await?;

        let on_loan: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE equipment_id = $1 AND status <> 'Returned')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if on_loan {
            return Err(AppError::Conflict(
                ErrorCode::EquipmentOnLoan,
                format!("Equipment {} is currently on loan", id),
            ));
        }

        sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Distinct non-empty categories, sorted
    async fn list_categories(&self) -> AppResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM equipment WHERE category IS NOT NULL AND category <> '' ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}
