//! Condition inference from keywords and flagged lab values.

use crate::models::enums::{ConditionStatus, LabFlag};
use crate::models::{Condition, LabResult};

struct CatalogEntry {
    name: &'static str,
    icd10: &'static str,
    keywords: &'static [&'static str],
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Prediabetes",
        icd10: "R73.03",
        keywords: &["prediabetes", "prediabetic", "a1c 5.7-6.4"],
    },
    CatalogEntry {
        name: "Fatty Liver",
        icd10: "K76.0",
        keywords: &["fatty liver", "nafld", "hepatic steatosis"],
    },
    CatalogEntry {
        name: "Hyperlipidemia",
        icd10: "E78.5",
        keywords: &["high ldl", "elevated ldl", "hyperlipidemia", "high cholesterol"],
    },
    CatalogEntry {
        name: "Elevated Liver Enzymes",
        icd10: "R74.01",
        keywords: &["elevated alt", "elevated ast", "liver enzymes"],
    },
];

const HEDGES: &[&str] = &["suspected", "possible"];

/// A1C band, in percent, that reads as prediabetes.
const PREDIABETES_A1C: std::ops::Range<f64> = 5.7..6.5;

const DEFAULT_SEVERITY: &str = "mild";

/// Catalog conditions mentioned in the text, then prediabetes from an
/// out-of-range A1C when the text did not already name it.
///
/// A mention is `suspected` only when its own line hedges. A hedge anywhere
/// else in the document does not downgrade it, so one "possible fatty liver"
/// leaves a confirmed hyperlipidemia active.
pub fn infer_conditions(text: &str, results: &[LabResult]) -> Vec<Condition> {
    let lines: Vec<String> = text.lines().map(str::to_lowercase).collect();
    let mut found = Vec::new();

    for entry in CATALOG {
        let hit = lines
            .iter()
            .find(|line| entry.keywords.iter().any(|k| line.contains(k)));
        let Some(line) = hit else { continue };

        let status = if HEDGES.iter().any(|h| line.contains(h)) {
            ConditionStatus::Suspected
        } else {
            ConditionStatus::Active
        };
        found.push(catalog_condition(entry, status));
    }

    for result in results {
        if !matches!(result.flag, LabFlag::High | LabFlag::Low) {
            continue;
        }
        if !result.test_name.to_lowercase().contains("a1c") {
            continue;
        }
        let Some(value) = result.value.trim_end_matches('%').trim().parse::<f64>().ok() else {
            continue;
        };
        if PREDIABETES_A1C.contains(&value) && !found.iter().any(|c: &Condition| c.name == "Prediabetes") {
            let mut condition = catalog_condition(&CATALOG[0], ConditionStatus::Active);
            condition.notes = Some(format!("A1C {}%", result.value.trim_end_matches('%')));
            found.push(condition);
        }
    }

    found
}

fn catalog_condition(entry: &CatalogEntry, status: ConditionStatus) -> Condition {
    let mut condition = Condition::new(entry.name, status);
    condition.code = Some(entry.icd10.to_string());
    condition.severity = Some(DEFAULT_SEVERITY.to_string());
    condition
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a1c(value: &str, flag: LabFlag) -> LabResult {
        LabResult {
            test_name: "Hemoglobin A1C".into(),
            value: value.into(),
            unit: Some("%".into()),
            reference_range: Some("<5.7".into()),
            flag,
            category: None,
        }
    }

    #[test]
    fn keywords_map_to_catalog_codes() {
        let found = infer_conditions("Imaging shows hepatic steatosis.\nLDL: HIGH LDL noted", &[]);
        let names: Vec<_> = found.iter().map(|c| (c.name.as_str(), c.code.as_deref())).collect();
        assert_eq!(
            names,
            vec![("Fatty Liver", Some("K76.0")), ("Hyperlipidemia", Some("E78.5"))]
        );
        assert!(found.iter().all(|c| c.status == ConditionStatus::Active));
        assert!(found.iter().all(|c| c.severity.as_deref() == Some("mild")));
    }

    #[test]
    fn hedging_applies_to_its_own_line() {
        let text = "Possible fatty liver on ultrasound.\nConfirmed hyperlipidemia.";
        let found = infer_conditions(text, &[]);
        assert_eq!(found[0].status, ConditionStatus::Suspected);
        assert_eq!(found[1].status, ConditionStatus::Active);
    }

    #[test]
    fn a1c_band_synthesizes_prediabetes() {
        let found = infer_conditions("", &[a1c("6.1", LabFlag::High)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Prediabetes");
        assert_eq!(found[0].code.as_deref(), Some("R73.03"));
        assert_eq!(found[0].notes.as_deref(), Some("A1C 6.1%"));
    }

    #[test]
    fn a1c_outside_band_or_unflagged_is_ignored() {
        assert!(infer_conditions("", &[a1c("6.8", LabFlag::High)]).is_empty());
        assert!(infer_conditions("", &[a1c("5.9", LabFlag::Normal)]).is_empty());
        assert!(infer_conditions("", &[a1c("n/a", LabFlag::High)]).is_empty());
    }

    #[test]
    fn a1c_does_not_duplicate_a_mention() {
        let found = infer_conditions("Prediabetes discussed.", &[a1c("6.0", LabFlag::High)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].notes, None);
    }
}
