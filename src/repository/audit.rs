//! Audit log repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use super::AuditRepository;
use crate::{
    error::{AppError, AppResult},
    models::audit::{AuditLog, NewAuditEntry},
};

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    table_name: String,
    record_id: Uuid,
    details: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLog {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            action: row.action.parse().map_err(|_| {
                AppError::Internal(format!("Audit entry {} has unknown action '{}'", row.id, row.action))
            })?,
            id: row.id,
            table_name: row.table_name,
            record_id: row.record_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Append an entry on the caller's connection, inside its transaction
pub(super) async fn record(conn: &mut PgConnection, entry: &NewAuditEntry) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, table_name, record_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.action.as_str())
    .bind(entry.table_name)
    .bind(entry.record_id)
    .bind(&entry.details)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgAuditRepository {
    pool: Pool<Postgres>,
}

impl PgAuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    /// Newest entries first
    async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_logs ORDER BY created_at DESC, id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLog::try_from).collect()
    }
}
