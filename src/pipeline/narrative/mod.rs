//! Heuristic parser for free-form markdown and plain-text medical documents.
//!
//! Everything here is best effort: rows and lines that do not fit a pattern
//! are passed over, never reported as errors.

pub mod appointments;
pub mod classify;
pub mod conditions;
pub mod labs;
pub mod notes;

use uuid::Uuid;

use crate::config::DOCUMENT_ID_NAMESPACE;
use crate::models::{LabPanel, MedicalRecord};

pub use appointments::AppointmentScan;
pub use classify::detect_document_type;
pub use labs::LabScan;

/// Stateless entry point; every call builds its own scan state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrativeParser;

impl NarrativeParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str, filename: &str) -> MedicalRecord {
        let document_type = detect_document_type(filename, text);
        let document_id = format!("doc_{}", Uuid::new_v5(&DOCUMENT_ID_NAMESPACE, text.as_bytes()));
        let mut record = MedicalRecord::new(document_id, document_type);

        record.title = classify::extract_title(text);
        record.document_date = classify::extract_document_date(text);
        record.patient_name = classify::extract_patient_name(text);
        record.provider = classify::extract_provider(text);
        record.summary = notes::extract_summary(text);
        record.followup_items = notes::extract_followup_items(text);

        let mut scan = LabScan::default();
        for line in text.lines() {
            scan.feed(line);
        }
        let results = scan.finish();
        record.conditions = conditions::infer_conditions(text, &results);
        if !results.is_empty() {
            let mut panel = LabPanel::new(document_type.as_str(), record.document_date);
            panel.summary = record.summary.clone();
            panel.results = results;
            record.lab_panels.push(panel);
        }

        record.appointments = AppointmentScan::default().scan(text);

        tracing::info!(
            filename = %filename,
            document_type = %document_type,
            lab_results = record.lab_result_count(),
            conditions = record.conditions.len(),
            followup_items = record.followup_items.len(),
            appointments = record.appointments.len(),
            "Parsed narrative document"
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ConditionStatus, DocumentType, LabFlag};
    use chrono::NaiveDate;

    const LAB_REPORT: &str = "\
# Jane Doe - Annual Labs

**Date:** March 15, 2024
**Physician:** Dr. Maria Lopez, Valley Clinic

## Results

**Metabolic**

| Test | Result | Reference | Interpretation |
|------|--------|-----------|----------------|
| Glucose | 105 mg/dL | 70-99 | ⚠️ High |
| Hemoglobin A1C | 5.9 % | <5.7 | ⚠️ Elevated |

**Lipids**

| LDL | 95 mg/dL | <100 | ✅ Normal |

## Summary

Borderline glucose. **Possible** early insulin resistance.

## Follow-up

1. Repeat A1C in 3 months
2. **Diet** review
";

    #[test]
    fn parses_a_lab_report_end_to_end() {
        let record = NarrativeParser::new().parse(LAB_REPORT, "2024-03-labs.md");

        assert_eq!(record.document_type, DocumentType::LabResult);
        assert_eq!(record.document_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(record.patient_name.as_deref(), Some("Jane Doe"));
        let provider = record.provider.as_ref().unwrap();
        assert_eq!(provider.name, "Maria Lopez");
        assert_eq!(provider.facility.as_deref(), Some("Valley Clinic"));

        assert_eq!(record.lab_panels.len(), 1);
        let panel = &record.lab_panels[0];
        assert_eq!(panel.label, "lab_result");
        assert_eq!(panel.date, record.document_date);
        assert_eq!(panel.results.len(), 3);
        assert_eq!(panel.results[0].category.as_deref(), Some("Metabolic"));
        assert_eq!(panel.results[2].category.as_deref(), Some("Lipids"));
        assert_eq!(panel.results[2].flag, LabFlag::Normal);

        let prediabetes = record
            .conditions
            .iter()
            .find(|c| c.name == "Prediabetes")
            .unwrap();
        assert_eq!(prediabetes.status, ConditionStatus::Active);
        assert_eq!(prediabetes.notes.as_deref(), Some("A1C 5.9%"));

        assert_eq!(
            record.summary.as_deref(),
            Some("Borderline glucose. Possible early insulin resistance.")
        );
        assert_eq!(record.followup_items, vec!["Repeat A1C in 3 months", "Diet review"]);
    }

    #[test]
    fn same_text_same_id() {
        let parser = NarrativeParser::new();
        let a = parser.parse(LAB_REPORT, "a.md");
        let b = parser.parse(LAB_REPORT, "b.md");
        assert_eq!(a.document_id, b.document_id);
        assert_ne!(a.document_id, parser.parse("other", "a.md").document_id);
    }

    #[test]
    fn plain_note_has_no_panel() {
        let record = NarrativeParser::new().parse("Patient feels well today.", "visit.txt");
        assert_eq!(record.document_type, DocumentType::MedicalRecord);
        assert!(record.lab_panels.is_empty());
        assert!(record.conditions.is_empty());
        assert!(record.appointments.is_empty());
    }
}
