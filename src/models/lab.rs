use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::LabFlag;

/// One lab event: a dated group of results from a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabPanel {
    pub label: String,
    pub date: Option<NaiveDate>,
    pub summary: Option<String>,
    #[serde(default)]
    pub results: Vec<LabResult>,
}

impl LabPanel {
    pub fn new(label: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            label: label.into(),
            date,
            summary: None,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    /// Kept as text: values like "<0.5" or "Negative" are legitimate.
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub flag: LabFlag,
    pub category: Option<String>,
}

impl LabResult {
    pub fn numeric_value(&self) -> Option<f64> {
        self.value
            .trim()
            .trim_start_matches(['<', '>'])
            .parse::<f64>()
            .ok()
    }

    /// "105 mg/dL" style rendering used by checkpoint tables.
    pub fn value_with_unit(&self) -> String {
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{} {}", self.value, unit),
            _ => self.value.clone(),
        }
    }
}
