use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::ConditionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    /// ICD-10 code
    pub code: Option<String>,
    pub diagnosed_date: Option<NaiveDate>,
    pub resolved_date: Option<NaiveDate>,
    pub status: ConditionStatus,
    pub severity: Option<String>,
    pub notes: Option<String>,
}

impl Condition {
    pub fn new(name: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            name: name.into(),
            code: None,
            diagnosed_date: None,
            resolved_date: None,
            status,
            severity: None,
            notes: None,
        }
    }
}

/// A risk recorded for screening purposes, not a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRisk {
    pub name: String,
    pub reason: Option<String>,
    pub screening: Option<String>,
}
