//! Clinical section catalog and per-entry extractors.
//!
//! Each extractor returns `Err(reason)` for an entry it cannot read; the
//! caller records the warning and moves on to the next entry.

use chrono::NaiveDate;

use super::parser::format_hl7_date;
use super::xml::XmlElement;
use crate::models::enums::{ConditionStatus, LabFlag, MedicationStatus, Section};
use crate::models::*;

type Extract = fn(&XmlElement, &mut MedicalRecord);

pub struct SectionSpec {
    pub template_id: &'static str,
    pub section: Section,
    extract: Extract,
}

impl SectionSpec {
    pub fn extract(&self, section: &XmlElement, record: &mut MedicalRecord) {
        (self.extract)(section, record)
    }
}

pub static CATALOG: &[SectionSpec] = &[
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.1.1",
        section: Section::Medications,
        extract: |s, r| r.medications = collect(r, Section::Medications, s.find_all("entry"), medication),
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.6.1",
        section: Section::Allergies,
        extract: |s, r| r.allergies = collect(r, Section::Allergies, s.find_all("entry"), allergy),
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.5.1",
        section: Section::Conditions,
        extract: |s, r| r.conditions = collect(r, Section::Conditions, s.find_all("entry"), problem),
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.7.1",
        section: Section::Procedures,
        extract: |s, r| r.procedures = collect(r, Section::Procedures, s.find_all("entry"), procedure),
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.3.1",
        section: Section::Labs,
        extract: results,
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.2.1",
        section: Section::Immunizations,
        extract: |s, r| {
            r.immunizations = collect(r, Section::Immunizations, s.find_all("entry"), immunization)
        },
    },
    SectionSpec {
        template_id: "2.16.840.1.113883.10.20.22.2.4.1",
        section: Section::Vitals,
        extract: vital_signs,
    },
];

/// Run `extract` over every entry, keeping the ones that parse.
fn collect<T>(
    record: &mut MedicalRecord,
    section: Section,
    entries: Vec<&XmlElement>,
    extract: fn(&XmlElement) -> Result<T, String>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match extract(entry) {
            Ok(item) => out.push(item),
            Err(reason) => skip(record, section, index, reason),
        }
    }
    out
}

fn skip(record: &mut MedicalRecord, section: Section, index: usize, reason: String) {
    tracing::warn!(section = %section, index, reason = %reason, "Skipped CCD entry");
    record.record_skip(EntryWarning {
        section,
        index,
        reason,
    });
}

/// `displayName`, falling back to the bare code.
fn coded_name(code: &XmlElement) -> Option<String> {
    code.attr("displayName")
        .or_else(|| code.attr("code"))
        .map(str::to_string)
}

/// `effectiveTime@value`, or its `low@value` when given as an interval.
fn point_date(el: &XmlElement) -> Option<NaiveDate> {
    let time = el.child("effectiveTime")?;
    time.attr("value")
        .or_else(|| time.child("low").and_then(|low| low.attr("value")))
        .and_then(format_hl7_date)
}

fn interval(time: Option<&XmlElement>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let bound = |name: &str| {
        time.and_then(|t| t.child(name))
            .and_then(|b| b.attr("value"))
            .and_then(format_hl7_date)
    };
    (bound("low"), bound("high"))
}

fn medication(entry: &XmlElement) -> Result<Medication, String> {
    let admin = entry
        .find("substanceAdministration")
        .ok_or("no substanceAdministration")?;
    let material = admin
        .find_path(&["consumable", "manufacturedProduct", "manufacturedMaterial"])
        .ok_or("no manufacturedMaterial")?;
    let code = material.child("code").ok_or("medication without a code")?;
    let mut med = Medication::new(coded_name(code).ok_or("medication code has no name")?);
    med.code = code.attr("code").map(str::to_string);

    if let Some(dose) = admin.find("doseQuantity") {
        med.dosage = match (dose.attr("value"), dose.attr("unit")) {
            (Some(v), Some(u)) => Some(format!("{v} {u}")),
            (Some(v), None) => Some(v.to_string()),
            _ => None,
        };
    }

    let times: Vec<&XmlElement> = admin.children_named("effectiveTime").collect();
    med.frequency = times
        .iter()
        .find(|t| t.attr("operator") == Some("A"))
        .and_then(|t| t.child("period"))
        .and_then(|p| match (p.attr("value"), p.attr("unit")) {
            (Some(v), Some(u)) => Some(format!("Every {v} {u}")),
            _ => None,
        });
    let span = times.iter().copied().find(|t| t.attr("operator").is_none());
    (med.start_date, med.end_date) = interval(span);

    med.status = admin
        .child("statusCode")
        .and_then(|s| s.attr("code"))
        .map(MedicationStatus::from_status_code)
        .unwrap_or(MedicationStatus::Active);
    Ok(med)
}

fn allergy(entry: &XmlElement) -> Result<Allergy, String> {
    let obs = entry.find("observation").ok_or("no observation")?;
    let agent = obs
        .find_path(&["participant", "participantRole", "playingEntity"])
        .ok_or("no playingEntity")?;
    let code = agent.child("code").ok_or("allergen without a code")?;
    let mut allergy = Allergy::new(
        coded_name(code)
            .or_else(|| agent.child("name").and_then(|n| n.text()).map(str::to_string))
            .ok_or("allergen has no name")?,
    );
    allergy.code = code.attr("code").map(str::to_string);

    let related = |severity: bool| {
        obs.find_all("entryRelationship")
            .into_iter()
            .filter(|rel| (rel.attr("typeCode") == Some("SUBJ")) == severity)
            .find_map(|rel| rel.path(&["observation", "value"]))
            .and_then(|v| v.attr("displayName"))
            .map(str::to_string)
    };
    allergy.reaction = related(false);
    allergy.severity = related(true);
    Ok(allergy)
}

fn problem(entry: &XmlElement) -> Result<Condition, String> {
    let obs = entry.find("observation").ok_or("no observation")?;
    let value = obs.child("value").ok_or("problem without a value")?;
    let status = obs
        .child("statusCode")
        .and_then(|s| s.attr("code"))
        .map(ConditionStatus::from_status_code)
        .unwrap_or(ConditionStatus::Active);
    let mut condition = Condition::new(coded_name(value).ok_or("problem value has no name")?, status);
    condition.code = value.attr("code").map(str::to_string);
    (condition.diagnosed_date, condition.resolved_date) = interval(obs.child("effectiveTime"));
    Ok(condition)
}

fn procedure(entry: &XmlElement) -> Result<Procedure, String> {
    let act = entry.find("procedure").ok_or("no procedure")?;
    let code = act.child("code").ok_or("procedure without a code")?;
    Ok(Procedure {
        name: coded_name(code).ok_or("procedure code has no name")?,
        code: code.attr("code").map(str::to_string),
        date: point_date(act),
    })
}

fn immunization(entry: &XmlElement) -> Result<Immunization, String> {
    let admin = entry
        .find("substanceAdministration")
        .ok_or("no substanceAdministration")?;
    let material = admin.find("manufacturedMaterial").ok_or("no manufacturedMaterial")?;
    let code = material.child("code").ok_or("vaccine without a code")?;
    Ok(Immunization {
        vaccine: coded_name(code).ok_or("vaccine code has no name")?,
        code: code.attr("code").map(str::to_string),
        date: point_date(admin),
    })
}

fn results(section: &XmlElement, record: &mut MedicalRecord) {
    let mut panels = Vec::new();
    for (index, organizer) in section.find_all("organizer").into_iter().enumerate() {
        let label = organizer
            .child("code")
            .and_then(coded_name)
            .unwrap_or_else(|| "Lab Panel".to_string());
        let mut panel = LabPanel::new(label, point_date(organizer));

        for obs in organizer.find_all("observation") {
            match lab_result(obs) {
                Ok(result) => panel.results.push(result),
                Err(reason) => skip(record, Section::Labs, index, reason),
            }
        }
        if !panel.results.is_empty() {
            panels.push(panel);
        }
    }
    record.lab_panels = panels;
}

fn lab_result(obs: &XmlElement) -> Result<LabResult, String> {
    let code = obs.child("code").ok_or("result without a code")?;
    let value = obs.child("value").ok_or("result without a value")?;
    let unit = value.attr("unit").map(str::to_string);

    let reference_range = obs
        .path(&["referenceRange", "observationRange"])
        .and_then(|range| {
            let bounds = range.child("value").and_then(|v| {
                let low = v.child("low").and_then(|l| l.attr("value"))?;
                let high = v.child("high").and_then(|h| h.attr("value"))?;
                Some(match &unit {
                    Some(u) => format!("{low}-{high} {u}"),
                    None => format!("{low}-{high}"),
                })
            });
            bounds.or_else(|| range.child("text").and_then(|t| t.text()).map(str::to_string))
        });

    Ok(LabResult {
        test_name: coded_name(code).ok_or("result code has no name")?,
        value: value
            .attr("value")
            .or_else(|| value.text())
            .or_else(|| value.attr("displayName"))
            .ok_or("result value is empty")?
            .to_string(),
        unit,
        reference_range,
        flag: obs
            .child("interpretationCode")
            .and_then(|c| c.attr("code"))
            .and_then(LabFlag::from_interpretation_code)
            .unwrap_or(LabFlag::Normal),
        category: None,
    })
}

fn vital_signs(section: &XmlElement, record: &mut MedicalRecord) {
    let mut sets = Vec::new();
    for (index, organizer) in section.find_all("organizer").into_iter().enumerate() {
        let mut set = VitalSet {
            date: point_date(organizer),
            measurements: Vec::new(),
        };
        for obs in organizer.find_all("observation") {
            let name = obs.child("code").and_then(coded_name);
            let value = obs.child("value").and_then(|v| v.attr("value").map(|x| (x, v.attr("unit"))));
            match (name, value) {
                (Some(name), Some((value, unit))) => set.measurements.push(VitalMeasurement {
                    name,
                    value: match unit {
                        Some(u) => format!("{value} {u}"),
                        None => value.to_string(),
                    },
                }),
                _ => skip(record, Section::Vitals, index, "vital sign without code or value".into()),
            }
        }
        if !set.measurements.is_empty() {
            sets.push(set);
        }
    }
    record.vitals = sets;
}
