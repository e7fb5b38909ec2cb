//! Audit trail queries

use crate::{error::AppResult, models::audit::AuditLog, repository::Repository};

/// Entries returned by `recent`
pub const RECENT_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Newest entries first
    pub async fn recent(&self) -> AppResult<Vec<AuditLog>> {
        self.repository.audit.recent(RECENT_LIMIT).await
    }
}
