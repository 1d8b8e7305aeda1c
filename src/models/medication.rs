use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::MedicationStatus;
use super::normalize_key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    /// RxNorm code when the source carries one
    pub code: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: MedicationStatus,
    pub prescriber: Option<String>,
}

impl Medication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            dosage: None,
            frequency: None,
            start_date: None,
            end_date: None,
            status: MedicationStatus::Unknown,
            prescriber: None,
        }
    }

    /// Natural key: the same drug mentioned in ten documents is one node.
    pub fn name_key(&self) -> String {
        normalize_key(&self.name)
    }
}
