use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Vital signs taken at one encounter, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSet {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub measurements: Vec<VitalMeasurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalMeasurement {
    pub name: String,
    /// Formatted "value unit", e.g. "120 mm[Hg]"
    pub value: String,
}
