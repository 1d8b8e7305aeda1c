use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{DocumentType, Section};
use super::*;

/// Everything one parser call extracted from one document.
///
/// List fields are always present (possibly empty). The record is built once,
/// reviewed, handed to the mutation generator and dropped; it is never written
/// back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub document_id: String,
    pub document_type: DocumentType,
    pub document_date: Option<NaiveDate>,
    pub title: Option<String>,
    pub source_organization: Option<String>,
    pub patient_name: Option<String>,
    pub demographics: Option<Demographics>,
    pub provider: Option<Provider>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub lab_panels: Vec<LabPanel>,
    #[serde(default)]
    pub immunizations: Vec<Immunization>,
    #[serde(default)]
    pub vitals: Vec<VitalSet>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub followup_items: Vec<String>,
    pub summary: Option<String>,
    /// Entries that could not be extracted, per section
    #[serde(default)]
    pub skipped: BTreeMap<Section, usize>,
    #[serde(default)]
    pub warnings: Vec<EntryWarning>,
}

/// One record inside a section could not be extracted and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWarning {
    pub section: Section,
    pub index: usize,
    pub reason: String,
}

impl MedicalRecord {
    pub fn new(document_id: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            document_id: document_id.into(),
            document_type,
            document_date: None,
            title: None,
            source_organization: None,
            patient_name: None,
            demographics: None,
            provider: None,
            medications: Vec::new(),
            allergies: Vec::new(),
            conditions: Vec::new(),
            procedures: Vec::new(),
            lab_panels: Vec::new(),
            immunizations: Vec::new(),
            vitals: Vec::new(),
            appointments: Vec::new(),
            followup_items: Vec::new(),
            summary: None,
            skipped: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, warning: EntryWarning) {
        *self.skipped.entry(warning.section).or_insert(0) += 1;
        self.warnings.push(warning);
    }

    pub fn skipped_in(&self, section: Section) -> usize {
        self.skipped.get(&section).copied().unwrap_or(0)
    }

    pub fn lab_result_count(&self) -> usize {
        self.lab_panels.iter().map(|p| p.results.len()).sum()
    }

    /// Extracted entry count per clinical section, for review screens.
    pub fn section_counts(&self) -> BTreeMap<Section, usize> {
        BTreeMap::from([
            (Section::Medications, self.medications.len()),
            (Section::Allergies, self.allergies.len()),
            (Section::Conditions, self.conditions.len()),
            (Section::Procedures, self.procedures.len()),
            (Section::Labs, self.lab_result_count()),
            (Section::Immunizations, self.immunizations.len()),
            (Section::Vitals, self.vitals.len()),
            (Section::Appointments, self.appointments.len()),
        ])
    }

    /// Keep only the chosen clinical sections (selective import).
    pub fn retain_sections(&mut self, keep: &[Section]) {
        let wants = |s: Section| keep.contains(&s);
        if !wants(Section::Medications) {
            self.medications.clear();
        }
        if !wants(Section::Allergies) {
            self.allergies.clear();
        }
        if !wants(Section::Conditions) {
            self.conditions.clear();
        }
        if !wants(Section::Procedures) {
            self.procedures.clear();
        }
        if !wants(Section::Labs) {
            self.lab_panels.clear();
        }
        if !wants(Section::Immunizations) {
            self.immunizations.clear();
        }
        if !wants(Section::Vitals) {
            self.vitals.clear();
        }
        if !wants(Section::Appointments) {
            self.appointments.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::MedicationStatus;

    #[test]
    fn new_record_lists_are_empty() {
        let record = MedicalRecord::new("doc-1", DocumentType::MedicalRecord);
        assert!(record.medications.is_empty());
        assert!(record.allergies.is_empty());
        assert!(record.lab_panels.is_empty());
        assert!(record.skipped.is_empty());
    }

    #[test]
    fn record_skip_counts_per_section() {
        let mut record = MedicalRecord::new("doc-1", DocumentType::ClinicalDocument);
        for index in 0..2 {
            record.record_skip(EntryWarning {
                section: Section::Medications,
                index,
                reason: "missing code".into(),
            });
        }
        assert_eq!(record.skipped_in(Section::Medications), 2);
        assert_eq!(record.skipped_in(Section::Allergies), 0);
        assert_eq!(record.warnings.len(), 2);
    }

    #[test]
    fn retain_sections_clears_others() {
        let mut record = MedicalRecord::new("doc-1", DocumentType::ClinicalDocument);
        let mut med = Medication::new("Metformin");
        med.status = MedicationStatus::Active;
        record.medications.push(med);
        record.allergies.push(Allergy::new("Penicillin"));
        record.retain_sections(&[Section::Allergies]);
        assert!(record.medications.is_empty());
        assert_eq!(record.allergies.len(), 1);
    }

    #[test]
    fn serializes_dates_as_iso() {
        let mut record = MedicalRecord::new("doc-1", DocumentType::LabResult);
        record.document_date = NaiveDate::from_ymd_opt(2023, 8, 15);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"2023-08-15\""));
        assert!(json.contains("\"document_type\":\"lab_result\""));
    }
}
