//! Equipment registry service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        enums::{AvailabilityStatus, EquipmentCondition},
        equipment::{
            check_manual_availability, CreateEquipment, Equipment, EquipmentQuery,
            UpdateEquipment,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list(query).await
    }

    pub async fn list_available(&self) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list(&EquipmentQuery::available()).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Equipment> {
        self.repository.equipment.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        if let Some(requested) = data.availability_status {
            check_manual_availability(AvailabilityStatus::Available, requested)?;
        }

        let equipment = self.repository.equipment.create(data).await?;
        tracing::info!(equipment_id = %equipment.id, name = %equipment.name, "Equipment created");
        Ok(equipment)
    }

    pub async fn update(&self, id: Uuid, data: &UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;

        let equipment = self.repository.equipment.update(id, data).await?;
        tracing::info!(
            equipment_id = %equipment.id,
            condition = %equipment.condition,
            availability = %equipment.availability_status,
            "Equipment updated"
        );
        Ok(equipment)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.equipment.delete(id).await?;
        tracing::info!(equipment_id = %id, "Equipment deleted");
        Ok(())
    }

    /// Distinct categories, for filtering
    pub async fn list_categories(&self) -> AppResult<Vec<String>> {
        self.repository.equipment.list_categories().await
    }

    /// Condition labels, best first
    pub fn conditions(&self) -> Vec<EquipmentCondition> {
        EquipmentCondition::ALL.to_vec()
    }
}
