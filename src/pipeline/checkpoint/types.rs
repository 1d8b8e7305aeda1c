use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;
use crate::models::*;

/// The fixed read battery a checkpoint export issues against a graph.
///
/// Implementations return rows in any order; the exporter sorts.
pub trait CheckpointSource {
    /// Person attributes including birth place. `None` when the member is unknown.
    fn person(&self, member_id: &str) -> Result<Option<Person>, DatabaseError>;
    fn insurance(&self, member_id: &str) -> Result<Vec<Insurance>, DatabaseError>;
    fn aliases(&self, member_id: &str) -> Result<Vec<Alias>, DatabaseError>;
    fn allergies(&self, member_id: &str) -> Result<Vec<Allergy>, DatabaseError>;
    fn conditions(&self, member_id: &str) -> Result<Vec<Condition>, DatabaseError>;
    fn medications(&self, member_id: &str) -> Result<Vec<Medication>, DatabaseError>;
    fn appointments_since(
        &self,
        member_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError>;
    fn lab_history(&self, member_id: &str) -> Result<Vec<LabPanel>, DatabaseError>;
    fn health_risks(&self, member_id: &str) -> Result<Vec<HealthRisk>, DatabaseError>;
    /// Direct family edges in both directions.
    fn relationships(&self, member_id: &str) -> Result<Vec<Relationship>, DatabaseError>;
    /// Every person in the graph, for bulk export.
    fn member_ids(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Everything recovered from one checkpoint document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointData {
    pub member_id: String,
    pub export_version: Option<String>,
    pub exported_at: Option<String>,
    pub person: Person,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub health_risks: Vec<HealthRisk>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Clinical sections in entity-model form; skipped rows are tallied here.
    pub record: MedicalRecord,
}
