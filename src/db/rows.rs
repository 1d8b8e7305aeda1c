//! Decoding property maps (as stored in SQLite or returned by a Cypher store)
//! back into entity values. Both stores hand over `node` and `rel` property
//! objects, so the same decoders serve both.

use std::str::FromStr;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::enums::{AliasSource, ConditionStatus, LabFlag, MedicationStatus};
use crate::models::*;

/// One result row / property object.
pub type Row = Map<String, Value>;

/// Text value of a field; numbers and booleans are stringified, blanks are absent.
pub fn text(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// ISO date prefix of a field (`2024-03-05` or `2024-03-05T…`).
pub fn date(row: &Row, field: &str) -> Option<NaiveDate> {
    let raw = text(row, field)?;
    let head = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub fn flag(row: &Row, field: &str) -> bool {
    match row.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|i| i != 0),
        _ => false,
    }
}

/// Nested property object of a result row (`node`, `rel`, ...).
pub fn object<'a>(row: &'a Row, field: &str) -> Option<&'a Row> {
    row.get(field).and_then(Value::as_object)
}

pub fn person_from(node: &Row, location: Option<&Row>) -> Option<Person> {
    let id = text(node, "id")?;
    Some(Person {
        id,
        name: text(node, "name"),
        preferred_name: text(node, "preferred_name"),
        full_legal_name: text(node, "full_legal_name"),
        date_of_birth: date(node, "date_of_birth"),
        gender: text(node, "gender"),
        blood_type: text(node, "blood_type"),
        role: text(node, "role"),
        address: text(node, "address"),
        birth_place: location.and_then(|loc| {
            Some(BirthPlace {
                city: text(loc, "city")?,
                country: text(loc, "country")?,
                country_code: text(loc, "country_code"),
            })
        }),
    })
}

pub fn alias_from(node: &Row) -> Option<Alias> {
    Some(Alias {
        name: text(node, "name")?,
        source: text(node, "source")
            .and_then(|s| AliasSource::from_str(&s).ok())
            .unwrap_or(AliasSource::Unknown),
        is_primary: flag(node, "is_primary"),
    })
}

pub fn allergy_from(node: &Row, rel: &Row) -> Option<Allergy> {
    Some(Allergy {
        allergen: text(node, "name")?,
        code: text(node, "code"),
        reaction: text(rel, "reaction"),
        severity: text(rel, "severity"),
    })
}

pub fn condition_from(node: &Row, rel: &Row) -> Option<Condition> {
    Some(Condition {
        name: text(node, "name")?,
        code: text(node, "icd10_code"),
        diagnosed_date: date(rel, "diagnosed_date"),
        resolved_date: date(rel, "resolved_date"),
        status: text(rel, "status")
            .and_then(|s| ConditionStatus::from_str(&s.to_lowercase()).ok())
            .unwrap_or(ConditionStatus::Active),
        severity: text(rel, "severity"),
        notes: text(rel, "notes"),
    })
}

pub fn medication_from(node: &Row, rel: &Row) -> Option<Medication> {
    Some(Medication {
        name: text(node, "name").or_else(|| text(node, "name_key"))?,
        code: text(node, "rxnorm_code"),
        dosage: text(rel, "dosage"),
        frequency: text(rel, "frequency"),
        start_date: date(rel, "start_date"),
        end_date: date(rel, "end_date"),
        status: text(rel, "status")
            .and_then(|s| MedicationStatus::from_str(&s).ok())
            .unwrap_or(MedicationStatus::Unknown),
        prescriber: text(rel, "prescriber"),
    })
}

pub fn appointment_from(node: &Row) -> Option<Appointment> {
    Some(Appointment {
        date: date(node, "date")?,
        time: text(node, "time"),
        appointment_type: text(node, "appointment_type"),
        facility: text(node, "facility"),
        clinic: text(node, "clinic"),
        location: text(node, "location"),
    })
}

pub fn lab_result_from(node: &Row) -> Option<LabResult> {
    Some(LabResult {
        test_name: text(node, "test_name")?,
        value: text(node, "value").unwrap_or_default(),
        unit: text(node, "unit"),
        reference_range: text(node, "reference_range"),
        flag: text(node, "flag")
            .and_then(|s| LabFlag::from_str(&s).ok())
            .unwrap_or(LabFlag::Normal),
        category: text(node, "category"),
    })
}

pub fn lab_panel_from(node: &Row, results: &[Row]) -> LabPanel {
    let mut panel = LabPanel::new(
        text(node, "label")
            .or_else(|| text(node, "document_type"))
            .unwrap_or_else(|| "lab_result".to_string()),
        date(node, "date"),
    );
    panel.summary = text(node, "summary");
    panel.results = results.iter().filter_map(lab_result_from).collect();
    panel
}

pub fn health_risk_from(node: &Row, rel: &Row) -> Option<HealthRisk> {
    Some(HealthRisk {
        name: text(node, "name")?,
        reason: text(rel, "reason"),
        screening: text(node, "screening"),
    })
}

pub fn insurance_from(node: &Row, facility: Option<&Row>) -> Option<Insurance> {
    Some(Insurance {
        name: text(node, "name")?,
        plan_type: text(node, "type"),
        member_number: text(node, "member_id"),
        group_number: text(node, "group_number"),
        facility_name: facility.and_then(|f| text(f, "name")),
        facility_address: facility.and_then(|f| text(f, "address")),
        facility_phone: facility.and_then(|f| text(f, "phone")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn text_handles_numbers_and_blanks() {
        let r = row(json!({"a": "x", "b": 5.5, "c": "  ", "d": null}));
        assert_eq!(text(&r, "a").as_deref(), Some("x"));
        assert_eq!(text(&r, "b").as_deref(), Some("5.5"));
        assert_eq!(text(&r, "c"), None);
        assert_eq!(text(&r, "d"), None);
        assert_eq!(text(&r, "missing"), None);
    }

    #[test]
    fn date_accepts_datetime_prefix() {
        let r = row(json!({"d": "2024-03-05T10:00:00", "bad": "March"}));
        assert_eq!(date(&r, "d"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(date(&r, "bad"), None);
    }

    #[test]
    fn condition_from_node_and_edge() {
        let node = row(json!({"name": "Prediabetes", "icd10_code": "R73.03"}));
        let rel = row(json!({"status": "suspected", "diagnosed_date": "2024-01-10"}));
        let c = condition_from(&node, &rel).unwrap();
        assert_eq!(c.code.as_deref(), Some("R73.03"));
        assert_eq!(c.status, ConditionStatus::Suspected);
        assert_eq!(c.diagnosed_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(c.severity, None);
    }

    #[test]
    fn alias_with_unknown_source() {
        let a = alias_from(&row(json!({"name": "Lin", "source": "made_up"}))).unwrap();
        assert_eq!(a.source, AliasSource::Unknown);
        assert!(!a.is_primary);
    }

    #[test]
    fn appointment_requires_date() {
        assert!(appointment_from(&row(json!({"time": "9:00"}))).is_none());
    }
}
